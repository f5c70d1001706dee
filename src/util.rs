/// Log a write decision at `debug`, or at `trace` when per-write logging is off
#[macro_export]
#[doc(hidden)]
macro_rules! sync_log {
    ($enabled: expr, $( $args:tt )*) => {
        if $enabled {
            ::tracing::debug!( $( $args )* );
        } else {
            ::tracing::trace!( $( $args )* );
        }
    };
}
