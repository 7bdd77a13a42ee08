//! Key layout and the server-side window script

use crate::core::window::WindowKind;
use crate::storage::backend::WindowKey;

/// Purge, check and record every window of one key in a single round trip.
///
/// KEYS: one sorted set per window, then the identity's endpoint index.
/// ARGV: now, record flag, member, endpoint, then `duration, limit` per window.
///
/// Replies `{status, count_1, oldest_1, ..}` where status is 1 when admitted,
/// oldest is -1 for an empty window, and the reply stops at the first window
/// found at its limit.
pub(crate) const ACQUIRE_SCRIPT: &str = r#"
local now = tonumber(ARGV[1])
local record = ARGV[2] == '1'
local member = ARGV[3]
local endpoint = ARGV[4]
local window_count = #KEYS - 1
local reply = {1}
local longest = 0

for i = 1, window_count do
    local duration = tonumber(ARGV[3 + 2 * i])
    local limit = tonumber(ARGV[4 + 2 * i])

    redis.call('ZREMRANGEBYSCORE', KEYS[i], '-inf', now - duration)
    local count = redis.call('ZCARD', KEYS[i])
    local oldest = -1
    local head = redis.call('ZRANGE', KEYS[i], 0, 0, 'WITHSCORES')
    if head[2] then
        oldest = tonumber(head[2])
    end

    table.insert(reply, count)
    table.insert(reply, oldest)

    if count >= limit then
        reply[1] = 0
        return reply
    end
    if duration > longest then
        longest = duration
    end
end

if record then
    for i = 1, window_count do
        redis.call('ZADD', KEYS[i], now, member)
        redis.call('PEXPIRE', KEYS[i], tonumber(ARGV[3 + 2 * i]))
    end
    local index = KEYS[window_count + 1]
    redis.call('SADD', index, endpoint)
    redis.call('PEXPIRE', index, longest)
end

return reply
"#;

/// Builds the Redis keys for window state.
///
/// Every key of one identity shares a `{identity}` hash tag so the script's
/// keys land in one cluster slot.
#[derive(Debug, Clone)]
pub struct KeyLayout {
    prefix: String,
}

impl KeyLayout {
    pub fn new(prefix: impl Into<String>) -> Self {
        Self {
            prefix: prefix.into(),
        }
    }

    pub fn prefix(&self) -> &str {
        &self.prefix
    }

    fn identity_tag(&self, identity: &str) -> String {
        format!("{}:{{{}}}", self.prefix, escape_segment(identity))
    }

    /// Sorted set holding one window of one key
    pub fn window_key(&self, key: &WindowKey, kind: WindowKind) -> String {
        format!(
            "{}:{}:{}",
            self.identity_tag(&key.identity),
            escape_segment(&key.endpoint),
            kind
        )
    }

    /// Set of endpoints that hold state for `identity`
    pub fn endpoint_index(&self, identity: &str) -> String {
        format!("{}:endpoints", self.identity_tag(identity))
    }

    /// Pattern matching every endpoint index under this prefix
    pub fn index_pattern(&self) -> String {
        format!("{}:{{*}}:endpoints", escape_glob(&self.prefix))
    }
}

/// Percent-encode the characters that would break key parsing, hash tags or
/// SCAN patterns
pub(crate) fn escape_segment(segment: &str) -> String {
    let mut escaped = String::with_capacity(segment.len());
    for c in segment.chars() {
        match c {
            '%' | ':' | '{' | '}' | '*' | '?' | '[' | ']' | '\\' => {
                escaped.push_str(&format!("%{:02X}", c as u32));
            }
            _ => escaped.push(c),
        }
    }
    escaped
}

fn escape_glob(value: &str) -> String {
    let mut escaped = String::with_capacity(value.len());
    for c in value.chars() {
        if matches!(c, '*' | '?' | '[' | ']' | '\\') {
            escaped.push('\\');
        }
        escaped.push(c);
    }
    escaped
}
