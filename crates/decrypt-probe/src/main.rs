use dlprobe::{
    Error, OpenOptions,
    exports::{exports, similar},
    probe::{DEFAULT_LIBRARY, Probe},
};
use std::{env, path::PathBuf, process};

/// Overrides the library path.
const LIBRARY_ENV: &str = "DECRYPT_PROBE_LIBRARY";

/// Opens the library with `RTLD_GLOBAL` when set to `1`.
const GLOBAL_ENV: &str = "DECRYPT_PROBE_GLOBAL";

fn main() {
    env_logger::init();

    let library = env::var_os(LIBRARY_ENV)
        .map(PathBuf::from)
        .unwrap_or_else(|| PathBuf::from(DEFAULT_LIBRARY));
    let global = env::var(GLOBAL_ENV).is_ok_and(|value| value == "1");
    let probe = Probe::new(library).options(OpenOptions::new().global(global));

    match probe.run() {
        Ok(report) => println!("{report}"),
        Err(err) => {
            println!("DLERROR: {}", err.diagnostic());
            log::error!("{err}");
            suggest(&probe, &err);
            process::abort();
        }
    }
}

/// Logs exported names resembling a symbol that failed to resolve.
fn suggest(probe: &Probe, err: &Error) {
    let Error::SymbolMissing { name, .. } = err else {
        return;
    };
    let Ok(list) = exports(probe.library()) else {
        return;
    };
    let stem = name.trim_start_matches("_Z").trim_start_matches(char::is_numeric);
    let stem = stem.get(..stem.len().min(7)).unwrap_or(stem);
    for export in similar(&list, stem) {
        match &export.demangled {
            Some(demangled) => log::info!("candidate: {} ({demangled})", export.name),
            None => log::info!("candidate: {}", export.name),
        }
    }
}
