use crate::domain::value_objects::UserId;
use serde::{Deserialize, Serialize};

/// 投稿・コメントの作者表示に使うユーザー概要（読み取り専用キャッシュ対象）
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct UserSummary {
    pub id: UserId,
    pub name: String,
    pub image: Option<String>,
}

impl UserSummary {
    pub fn new(id: UserId, name: impl Into<String>) -> Self {
        Self {
            id,
            name: name.into(),
            image: None,
        }
    }

    pub fn with_image(mut self, image: impl Into<String>) -> Self {
        self.image = Some(image.into());
        self
    }

    /// 参照解決に失敗した場合の仮の概要。イベント自体は捨てない
    pub fn placeholder(id: UserId) -> Self {
        Self {
            id,
            name: String::new(),
            image: None,
        }
    }

    pub fn is_placeholder(&self) -> bool {
        self.name.is_empty() && self.image.is_none()
    }
}
