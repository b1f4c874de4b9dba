//! Interpretation of the provider's `cache-control` response header
//!
//! Anything short of an explicit, positive `max-age` means "do not cache".

/// What the provider allows the filter to do with the returned headers
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum CacheDirective {
    /// Cache until the given unix timestamp (seconds)
    ExpiresAt(i64),
    DoNotCache,
}

impl CacheDirective {
    /// Parses a `cache-control` value relative to `now` (unix seconds).
    ///
    /// `no-cache`, `no-store` and `must-revalidate` win over everything else,
    /// wherever they appear. A `max-age` that is not a positive integer, or
    /// a header without any recognized directive, yields [`Self::DoNotCache`].
    /// Expiries beyond `i64::MAX` saturate.
    pub fn parse(header: &str, now: i64) -> Self {
        let mut max_age = None;
        for directive in header.split(',') {
            let (name, argument) = match directive.split_once('=') {
                Some((name, argument)) => (name.trim(), Some(argument.trim().trim_matches('"'))),
                None => (directive.trim(), None),
            };

            if ["no-cache", "no-store", "must-revalidate"]
                .iter()
                .any(|forbidding| name.eq_ignore_ascii_case(forbidding))
            {
                return Self::DoNotCache;
            }
            if name.eq_ignore_ascii_case("max-age") && max_age.is_none() {
                max_age = Some(argument.and_then(|seconds| seconds.parse::<i64>().ok()));
            }
        }

        match max_age {
            Some(Some(seconds)) if seconds > 0 => Self::ExpiresAt(now.saturating_add(seconds)),
            _ => Self::DoNotCache,
        }
    }

    pub fn expiry(&self) -> Option<i64> {
        match self {
            Self::ExpiresAt(expiry) => Some(*expiry),
            Self::DoNotCache => None,
        }
    }
}
