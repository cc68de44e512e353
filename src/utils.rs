use std::sync::Once;

static INIT: Once = Once::new();

pub fn set_panic_hook() {
    // When the `console_error_panic_hook` feature is enabled, we can call the
    // `set_panic_hook` function at least once during initialization, and then
    // we will get better error messages if our code ever panics.
    //
    // For more details see
    // https://github.com/rustwasm/console_error_panic_hook#readme
    #[cfg(feature = "console_error_panic_hook")]
    console_error_panic_hook::set_once();
}

/// Panic hook plus `console_log`, once per page.
pub fn init_logging() {
    INIT.call_once(|| {
        set_panic_hook();
        console_log::init_with_level(log::Level::Info).ok();
    });
}
