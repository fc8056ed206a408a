use serde::{Deserialize, Serialize};
use std::{fmt, str::FromStr};

/// ミューテーション入力のバリデーション失敗理由。
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
pub enum ValidationFailureKind {
    /// 本文・コメントが空（空白のみを含む）。
    EmptyContent,
    /// 本文・コメントのサイズが制限を超過。
    ContentTooLarge,
    /// 対象の投稿がまだサーバーに存在しない（未確定の一時ID）。
    MissingTarget,
}

impl ValidationFailureKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            ValidationFailureKind::EmptyContent => "empty_content",
            ValidationFailureKind::ContentTooLarge => "content_too_large",
            ValidationFailureKind::MissingTarget => "missing_target",
        }
    }
}

impl fmt::Display for ValidationFailureKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ValidationFailureKind {
    type Err = ();

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "empty_content" => Ok(ValidationFailureKind::EmptyContent),
            "content_too_large" => Ok(ValidationFailureKind::ContentTooLarge),
            "missing_target" => Ok(ValidationFailureKind::MissingTarget),
            _ => Err(()),
        }
    }
}
