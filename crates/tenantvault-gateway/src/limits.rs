use crate::signature::normalize_content_type;
use tenantvault_core::SizeLimits;

/// Maps a content type to the largest payload accepted for it.
#[derive(Debug, Clone, Copy)]
pub struct SizeLimiter {
    limits: SizeLimits,
}

impl Default for SizeLimiter {
    fn default() -> Self {
        Self::new(SizeLimits::default())
    }
}

impl SizeLimiter {
    pub fn new(limits: SizeLimits) -> Self {
        Self { limits }
    }

    /// Maximum payload size in bytes for `content_type`. Total: unknown types
    /// fall into the default tier.
    pub fn max_bytes(&self, content_type: &str) -> u64 {
        let content_type = normalize_content_type(content_type);
        let (kind, subtype) = content_type
            .split_once('/')
            .unwrap_or((content_type.as_str(), ""));

        match (kind, subtype) {
            ("image", "svg+xml") => self.limits.text_bytes,
            ("image", _) => self.limits.image_bytes,
            ("text", _) => self.limits.text_bytes,
            ("application", "json" | "xml") => self.limits.text_bytes,
            ("application", "pdf" | "msword" | "zip" | "gzip" | "x-gzip") => {
                self.limits.document_bytes
            }
            ("application", sub) if sub.starts_with("vnd.") => self.limits.document_bytes,
            ("audio" | "video", _) => self.limits.media_bytes,
            ("application", "ogg") => self.limits.media_bytes,
            _ => self.limits.default_bytes,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const MB: u64 = 1024 * 1024;

    #[test]
    fn default_tiers() {
        let limiter = SizeLimiter::default();
        assert_eq!(limiter.max_bytes("image/png"), 10 * MB);
        assert_eq!(limiter.max_bytes("image/svg+xml"), 5 * MB);
        assert_eq!(limiter.max_bytes("text/plain"), 5 * MB);
        assert_eq!(limiter.max_bytes("application/json"), 5 * MB);
        assert_eq!(limiter.max_bytes("application/pdf"), 50 * MB);
        assert_eq!(
            limiter.max_bytes("application/vnd.openxmlformats-officedocument.wordprocessingml.document"),
            50 * MB
        );
        assert_eq!(limiter.max_bytes("application/zip"), 50 * MB);
        assert_eq!(limiter.max_bytes("video/mp4"), 100 * MB);
        assert_eq!(limiter.max_bytes("audio/mpeg"), 100 * MB);
    }

    #[test]
    fn unknown_types_use_the_default_tier() {
        let limiter = SizeLimiter::default();
        assert_eq!(limiter.max_bytes("application/x-unknown"), 10 * MB);
        assert_eq!(limiter.max_bytes(""), 10 * MB);
        assert_eq!(limiter.max_bytes("garbage"), 10 * MB);
    }

    #[test]
    fn parameters_and_case_are_ignored() {
        let limiter = SizeLimiter::default();
        assert_eq!(limiter.max_bytes("VIDEO/MP4; codecs=avc1"), 100 * MB);
    }

    #[test]
    fn configured_limits_apply() {
        let limiter = SizeLimiter::new(SizeLimits {
            image_bytes: 1024,
            ..SizeLimits::default()
        });
        assert_eq!(limiter.max_bytes("image/jpeg"), 1024);
        assert_eq!(limiter.max_bytes("text/csv"), 5 * MB);
    }
}
