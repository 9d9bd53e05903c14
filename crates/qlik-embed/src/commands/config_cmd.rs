//! `config`: file locations and the resolved configuration.

use serde::Serialize;
use tabled::Tabled;

use crate::cli::{ConfigArgs, ConfigCommand, GlobalOpts};
use crate::config;
use crate::error::CliError;
use crate::output;

#[derive(Serialize, Tabled)]
struct ProfileRow {
    #[tabled(rename = "Name")]
    name: String,
    #[tabled(rename = "Default")]
    default: String,
    #[tabled(rename = "Host")]
    host: String,
    #[tabled(rename = "Auth")]
    auth_type: String,
    #[tabled(rename = "App")]
    app_id: String,
}

pub fn handle(args: ConfigArgs, global: &GlobalOpts) -> Result<(), CliError> {
    match args.command {
        ConfigCommand::Path => {
            let out = format!(
                "config: {}\nstore:  {}",
                config::config_path().display(),
                config::resolve_store_path(global).display()
            );
            output::print_output(&out, global.quiet);
            Ok(())
        }

        // `load_config_or_default` renders the default config when no file exists.
        ConfigCommand::Show => {
            let cfg = config::load_config_or_default();
            let out = output::render_single(
                &global.output,
                &cfg,
                |c| format!("{c:#?}"),
                |_| config::config_path().display().to_string(),
            );
            output::print_output(&out, global.quiet);
            Ok(())
        }

        ConfigCommand::Profiles => {
            let cfg = config::load_config_or_default();
            let active = config::active_profile_name(global, &cfg);
            let mut rows: Vec<ProfileRow> = cfg
                .profiles
                .iter()
                .map(|(name, p)| ProfileRow {
                    default: if *name == active { "*".into() } else { String::new() },
                    name: name.clone(),
                    host: p.host.clone(),
                    auth_type: p.auth_type.clone(),
                    app_id: p.app_id.clone(),
                })
                .collect();
            rows.sort_by(|a, b| a.name.cmp(&b.name));

            let out = output::render_list(
                &global.output,
                &rows,
                |r| ProfileRow {
                    name: r.name.clone(),
                    default: r.default.clone(),
                    host: r.host.clone(),
                    auth_type: r.auth_type.clone(),
                    app_id: r.app_id.clone(),
                },
                |r| r.name.clone(),
            );
            output::print_output(&out, global.quiet);
            Ok(())
        }
    }
}
