use serde::Deserialize;
use std::sync::Arc;
use std::time::Duration;

use crate::gateway::{InferenceGateway, InferenceRequest};

/// Content handed to the gate for classification.
pub enum ModerationContent<'a> {
    Images(&'a [String]),
    Text(&'a str),
    Comment(&'a str),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ModerationVerdict {
    Clean,
    Violation { category: String, reason: String },
}

#[derive(Debug, Deserialize)]
struct RawVerdict {
    #[serde(default)]
    is_violation: bool,
    #[serde(default)]
    category: Option<String>,
    #[serde(default)]
    reason: Option<String>,
}

const IMAGE_MODERATION_PROMPT: &str = "\
你是一个内容安全审核系统。请分析这张/这些图片，判断是否存在以下违规情况：
1. 图片与食物完全无关（如自拍、风景、截图、文档等非食物图片）
2. 图片包含色情、裸露内容
3. 图片包含暴力、血腥、恐怖内容
4. 图片包含违法犯罪相关内容
5. 图片包含政治敏感内容

注意：只要图片中包含食物（即使同时有其他物品），就不算违规。
只有图片完全与食物无关，或包含上述 2-5 类违规内容时，才判定为违规。

请严格按以下 JSON 格式返回，不要包含任何其他文本：
如果不违规：{\"is_violation\": false}
如果违规：{\"is_violation\": true, \"category\": \"分类值\", \"reason\": \"简要中文原因\"}

category 可选值：irrelevant_image, pornography, violence, crime, politics, other";

fn text_moderation_prompt(text_input: &str) -> String {
    format!(
        "你是一个内容安全审核系统。请分析以下用户输入的文本，判断是否存在违规情况：\n\n\
         用户输入文本：\"{text_input}\"\n\n\
         判断标准：\n\
         1. 文本与食物描述完全无关（如随机文字、无意义内容等）\n\
         2. 文本包含色情、低俗内容\n\
         3. 文本包含暴力、恐怖相关描述\n\
         4. 文本包含违法犯罪相关内容\n\
         5. 文本包含政治敏感言论\n\n\
         注意：只要文本是在描述食物、饮料、餐食（即使描述不准确或简短），就不算违规。\n\n\
         请严格按以下 JSON 格式返回，不要包含任何其他文本：\n\
         如果不违规：{{\"is_violation\": false}}\n\
         如果违规：{{\"is_violation\": true, \"category\": \"分类值\", \"reason\": \"简要中文原因\"}}\n\n\
         category 可选值：irrelevant_image, inappropriate_text, pornography, violence, crime, politics, other"
    )
}

fn comment_moderation_prompt(content: &str) -> String {
    format!(
        "你是一个内容安全审核系统。请分析以下用户评论内容，判断是否存在违规情况：\n\n\
         评论内容：\"{content}\"\n\n\
         判断标准：\n\
         1. 包含色情、低俗、露骨内容\n\
         2. 包含暴力、恐怖、血腥描述\n\
         3. 包含违法犯罪相关内容\n\
         4. 包含政治敏感言论、地域歧视\n\
         5. 包含人身攻击、侮辱谩骂\n\
         6. 包含广告、营销、垃圾信息\n\
         7. 包含恶意灌水、无意义内容\n\n\
         注意：正常的食物评价（如\"好吃\"、\"推荐\"、\"味道不错\"）不算违规。\n\n\
         请严格按以下 JSON 格式返回，不要包含任何其他文本：\n\
         如果不违规：{{\"is_violation\": false}}\n\
         如果违规：{{\"is_violation\": true, \"category\": \"分类值\", \"reason\": \"简要中文原因\"}}\n\n\
         category 可选值：pornography, violence, crime, politics, harassment, spam, inappropriate_text, other"
    )
}

/// Classifies task content before expensive analysis runs.
///
/// Fail-open: when the moderation call itself errors the gate answers `Clean`,
/// so a moderation-infrastructure outage never blocks analysis. Do not change
/// this to fail-closed without a product decision.
pub struct ModerationGate {
    gateway: Arc<dyn InferenceGateway>,
    vision_model: String,
    text_model: String,
    timeout: Duration,
}

impl ModerationGate {
    pub fn new(
        gateway: Arc<dyn InferenceGateway>,
        vision_model: impl Into<String>,
        text_model: impl Into<String>,
        timeout: Duration,
    ) -> ModerationGate {
        ModerationGate {
            gateway,
            vision_model: vision_model.into(),
            text_model: text_model.into(),
            timeout,
        }
    }

    pub async fn check(&self, content: ModerationContent<'_>) -> ModerationVerdict {
        let request = match content {
            ModerationContent::Images(urls) => {
                if urls.is_empty() {
                    return ModerationVerdict::Clean;
                }
                InferenceRequest {
                    model: self.vision_model.clone(),
                    prompt: IMAGE_MODERATION_PROMPT.to_string(),
                    image_urls: urls.to_vec(),
                    temperature: 0.1,
                    timeout: self.timeout,
                }
            }
            ModerationContent::Text(text) => {
                if text.trim().is_empty() {
                    return ModerationVerdict::Clean;
                }
                InferenceRequest {
                    model: self.text_model.clone(),
                    prompt: text_moderation_prompt(text),
                    image_urls: vec![],
                    temperature: 0.1,
                    timeout: self.timeout,
                }
            }
            ModerationContent::Comment(text) => {
                if text.trim().is_empty() {
                    return ModerationVerdict::Clean;
                }
                InferenceRequest {
                    model: self.text_model.clone(),
                    prompt: comment_moderation_prompt(text),
                    image_urls: vec![],
                    temperature: 0.1,
                    timeout: self.timeout,
                }
            }
        };

        let raw = match self.gateway.invoke(request).await {
            Ok(raw) => raw,
            Err(err) => {
                tracing::warn!("moderation call failed, letting content through: {}", err);
                return ModerationVerdict::Clean;
            }
        };

        match serde_json::from_value::<RawVerdict>(raw) {
            Ok(verdict) if verdict.is_violation => ModerationVerdict::Violation {
                category: verdict.category.unwrap_or_else(|| "other".to_string()),
                reason: verdict.reason.unwrap_or_else(|| "内容违规".to_string()),
            },
            Ok(_) => ModerationVerdict::Clean,
            Err(err) => {
                tracing::warn!("unparseable moderation verdict, letting content through: {}", err);
                ModerationVerdict::Clean
            }
        }
    }
}
