//! `aipo doctor check`: preflight diagnostics for the engine's own storage
//! and, optionally, one adapter's spec/credentials (spec.md §6 `doctor`
//! surface). Grounded in the teacher's `doctor::run` shape: gather
//! independent checks, print each, return non-zero if any failed.

use aipo_core::Paths;
use aipo_evidence::{EXIT_CONFIG_ERROR, EXIT_SUCCESS};

use crate::cli::args::DoctorCheckArgs;
use crate::cli::commands::runtime::build_adapter;
use crate::loaders;

struct Check {
    name: &'static str,
    ok: bool,
    detail: String,
}

pub async fn check(args: DoctorCheckArgs) -> anyhow::Result<i32> {
    let mut checks = Vec::new();

    let paths = match args.storage.output_dir.as_deref() {
        Some(root) => Paths::under(root),
        None => Paths::resolve(),
    };
    checks.push(match paths.ensure_all() {
        Ok(()) => Check { name: "storage directories", ok: true, detail: format!("{}", paths.data_dir.display()) },
        Err(e) => Check { name: "storage directories", ok: false, detail: e.to_string() },
    });

    if let Some(config_path) = &args.storage.config {
        checks.push(match aipo_core::config::resolve(Default::default(), Some(config_path)) {
            Ok(_) => Check { name: "config file", ok: true, detail: config_path.display().to_string() },
            Err(e) => Check { name: "config file", ok: false, detail: e.to_string() },
        });
    }

    if let Some(adapter_name) = &args.adapter {
        match loaders::load_adapter_spec(adapter_name) {
            Ok(spec) => {
                checks.push(match spec.validate() {
                    Ok(()) => Check { name: "adapter spec", ok: true, detail: spec.name.clone() },
                    Err(e) => Check { name: "adapter spec", ok: false, detail: e },
                });
                if let Some(auth) = &spec.auth {
                    checks.push(match auth.resolve() {
                        Ok(_) => Check { name: "adapter credential", ok: true, detail: auth.env_var.clone() },
                        Err(e) => Check { name: "adapter credential", ok: false, detail: e },
                    });
                }
                checks.push(match build_adapter(&spec) {
                    Ok(a) => Check { name: "adapter construction", ok: true, detail: a.provider_name().to_string() },
                    Err(e) => Check { name: "adapter construction", ok: false, detail: e.to_string() },
                });
            }
            Err(e) => checks.push(Check { name: "adapter spec", ok: false, detail: e.to_string() }),
        }
    }

    let mut all_ok = true;
    for check in &checks {
        let mark = if check.ok { "ok" } else { "FAIL" };
        all_ok &= check.ok;
        println!("[{mark}] {}: {}", check.name, check.detail);
    }

    Ok(if all_ok { EXIT_SUCCESS } else { EXIT_CONFIG_ERROR })
}
