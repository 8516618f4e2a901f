/// Open a shared library
/// # Example
/// ```no_run
/// # use dlprobe::open_library;
/// // lazy binding, local visibility
/// let lib = open_library!("target/libfixture.so");
/// // immediate binding
/// let lib = open_library!("target/libfixture.so", lazy: false);
/// // export the library's symbols to the process-global namespace
/// let lib = open_library!("target/libfixture.so", global: true);
/// let lib = open_library!("target/libfixture.so", lazy: false, global: true);
/// ```
#[macro_export]
macro_rules! open_library {
    ($path:expr) => {
        $crate::open_library($path)
    };
    ($path:expr, lazy: $lazy:expr) => {
        $crate::OpenOptions::new().lazy($lazy).open($path)
    };
    ($path:expr, global: $global:expr) => {
        $crate::OpenOptions::new().global($global).open($path)
    };
    ($path:expr, lazy: $lazy:expr, global: $global:expr) => {
        $crate::OpenOptions::new()
            .lazy($lazy)
            .global($global)
            .open($path)
    };
}
