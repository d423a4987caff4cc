use std::time::Duration;

use crate::ListenEndpoint;

pub(crate) const fn _default_false() -> bool {
    false
}

#[inline]
pub(crate) fn _default_http_listen() -> ListenEndpoint {
    #[allow(clippy::unwrap_used)]
    "0.0.0.0:8888".parse().unwrap()
}

#[inline]
pub(crate) fn _default_http_path() -> String {
    "/".to_owned()
}

#[inline]
pub(crate) fn _default_empty_string() -> String {
    "".to_owned()
}

pub(crate) const fn _default_download_buffer_limit() -> u64 {
    1024 * 1024
}

#[inline]
pub(crate) fn _default_connect_timeout() -> Duration {
    Duration::from_secs(30)
}

#[inline]
pub(crate) fn _default_inactivity_timeout() -> Duration {
    Duration::from_secs(60 * 5)
}
