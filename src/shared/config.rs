use serde::{Deserialize, Serialize};

/// ユーザー概要キャッシュの TTL 上限（1年）
pub const MAX_USER_TTL_SECS: u64 = 365 * 24 * 60 * 60;

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct FeedConfig {
    pub pagination: PaginationConfig,
    pub realtime: RealtimeConfig,
    pub cache: CacheConfig,
    pub mutation: MutationConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct PaginationConfig {
    /// 1回の取得ごとに広げるウィンドウ幅
    pub page_step: usize,
    pub initial_window: usize,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct RealtimeConfig {
    pub channel_capacity: usize,
    pub subscribe_comments: bool,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct CacheConfig {
    pub user_ttl_secs: u64,
    pub user_capacity: usize,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct MutationConfig {
    pub max_comment_length: usize,
    #[serde(default = "default_notify_post_author")]
    pub notify_post_author: bool,
}

fn default_notify_post_author() -> bool {
    true
}

impl Default for FeedConfig {
    fn default() -> Self {
        Self {
            pagination: PaginationConfig {
                page_step: 4,
                initial_window: 0,
            },
            realtime: RealtimeConfig {
                channel_capacity: 100,
                subscribe_comments: true,
            },
            cache: CacheConfig {
                user_ttl_secs: 600, // 10 minutes
                user_capacity: 512,
            },
            mutation: MutationConfig {
                max_comment_length: 2000,
                notify_post_author: true,
            },
        }
    }
}

impl FeedConfig {
    pub fn from_env() -> Self {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// 任意のキー解決関数から設定を組み立てる（テストでは環境変数を汚さずに使う）
    pub fn from_lookup<F>(lookup: F) -> Self
    where
        F: Fn(&str) -> Option<String>,
    {
        // 既定値
        let mut cfg = Self::default();

        if let Some(value) = lookup("LINKUP_PAGE_STEP").as_deref().and_then(parse_usize) {
            cfg.pagination.page_step = value.max(1);
        }
        if let Some(value) = lookup("LINKUP_INITIAL_WINDOW")
            .as_deref()
            .and_then(parse_usize)
        {
            cfg.pagination.initial_window = value;
        }

        if let Some(value) = lookup("LINKUP_REALTIME_CHANNEL_CAPACITY")
            .as_deref()
            .and_then(parse_usize)
        {
            cfg.realtime.channel_capacity = value.max(1);
        }
        if let Some(v) = lookup("LINKUP_SUBSCRIBE_COMMENTS") {
            cfg.realtime.subscribe_comments = parse_bool(&v, cfg.realtime.subscribe_comments);
        }

        if let Some(value) = lookup("LINKUP_USER_CACHE_TTL_SECS")
            .as_deref()
            .and_then(parse_u64)
        {
            cfg.cache.user_ttl_secs = value;
        }
        if let Some(value) = lookup("LINKUP_USER_CACHE_CAPACITY")
            .as_deref()
            .and_then(parse_usize)
        {
            cfg.cache.user_capacity = value.max(1);
        }

        if let Some(value) = lookup("LINKUP_MAX_COMMENT_LENGTH")
            .as_deref()
            .and_then(parse_usize)
        {
            cfg.mutation.max_comment_length = value.max(1);
        }
        if let Some(v) = lookup("LINKUP_NOTIFY_POST_AUTHOR") {
            cfg.mutation.notify_post_author = parse_bool(&v, cfg.mutation.notify_post_author);
        }

        cfg
    }

    pub fn validate(&self) -> Result<(), String> {
        if self.pagination.page_step == 0 {
            return Err("Pagination page_step must be greater than 0".to_string());
        }
        if self.realtime.channel_capacity == 0 {
            return Err("Realtime channel_capacity must be greater than 0".to_string());
        }
        if self.cache.user_capacity == 0 {
            return Err("Cache user_capacity must be greater than 0".to_string());
        }
        if self.cache.user_ttl_secs > MAX_USER_TTL_SECS {
            return Err(format!(
                "Cache user_ttl_secs must be at most {MAX_USER_TTL_SECS}"
            ));
        }
        if self.mutation.max_comment_length == 0 {
            return Err("Mutation max_comment_length must be greater than 0".to_string());
        }
        Ok(())
    }
}

fn parse_bool(s: &str, default: bool) -> bool {
    match s.to_ascii_lowercase().as_str() {
        "1" | "true" | "yes" | "on" => true,
        "0" | "false" | "no" | "off" => false,
        _ => default,
    }
}

fn parse_u64(value: &str) -> Option<u64> {
    value.trim().parse::<u64>().ok()
}

fn parse_usize(value: &str) -> Option<usize> {
    value.trim().parse::<usize>().ok()
}
