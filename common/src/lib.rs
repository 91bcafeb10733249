//! Common library for distributed crawler
//! 定义Dashboard和Worker之间在TCP连接上交换的任务/结果结构体，以及帧编解码

use serde::{Deserialize, Serialize};
use serde_json::Value;

pub mod codec;
pub mod token;

/// 随任务透传的字段
///
/// Worker不解释这些字段，只把请求里带来的JSON值原样写回结果，类型不做限制。
/// 请求里没有的字段（或值为`null`），结果里同样不出现。
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct PassThrough {
    /// 商家TAG
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub tag: Option<Value>,

    /// 爬取的类型
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub billing_type: Option<Value>,

    /// 包含的商品个数
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub crawl_num: Option<Value>,

    /// 请求模式
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub req_method: Option<Value>,

    /// 额外的请求头
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub extra_header: Option<Value>,
}

/// Dashboard下发给Worker的任务
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TaskRequest {
    /// 校验密码
    pub token: String,

    /// 需要爬取的链接
    pub url: String,

    #[serde(flatten)]
    pub extra: PassThrough,
}

impl TaskRequest {
    pub fn new(token: impl Into<String>, url: impl Into<String>) -> Self {
        Self {
            token: token.into(),
            url: url.into(),
            extra: PassThrough::default(),
        }
    }
}

/// Worker回传给Dashboard的结果
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TaskResponse {
    /// 校验密码
    pub token: String,

    /// 爬取的链接（原样回显）
    pub url: String,

    /// 是否成功抓取页面
    pub success: bool,

    /// 爬虫耗时（整秒）
    pub runtime: u64,

    /// 爬虫开始时间，格式 `YYYY-MM-DD HH:MM:SS`
    pub start_time: String,

    /// 页面的html源码，失败或为空时不出现
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub webdata: Option<String>,

    #[serde(flatten)]
    pub extra: PassThrough,
}

impl TaskResponse {
    /// 抓取成功的结果
    pub fn completed(request: TaskRequest, body: String, runtime: u64, start_time: String) -> Self {
        let webdata = if body.is_empty() { None } else { Some(body) };
        Self::build(request, true, webdata, runtime, start_time)
    }

    /// 抓取失败的结果，不携带webdata
    pub fn failed(request: TaskRequest, runtime: u64, start_time: String) -> Self {
        Self::build(request, false, None, runtime, start_time)
    }

    fn build(
        request: TaskRequest,
        success: bool,
        webdata: Option<String>,
        runtime: u64,
        start_time: String,
    ) -> Self {
        Self {
            token: request.token,
            url: request.url,
            success,
            runtime,
            start_time,
            webdata,
            extra: request.extra,
        }
    }
}
