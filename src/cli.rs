use anyhow::{Result, anyhow};
use log::info;
use pico_args::Arguments;
use signal_hook::consts::{SIGINT, SIGTERM};
use std::{
    env, fs,
    io::{self, Read},
    path::PathBuf,
    sync::{Arc, atomic::AtomicBool},
};

use crate::actions;
use crate::config::{ConfigState, OutcomeUrls, Profile};
use crate::device;
use crate::host::{self, ReplayOptions, Script};
use crate::input::AdapterChoice;
use crate::render::TextPresenter;

pub fn run() -> Result<()> {
    let mut pargs = Arguments::from_env();

    // No args -> general help
    if env::args().len() == 1 {
        print_help();
        return Ok(());
    }

    // Flags-based help (-h/--help)
    if pargs.contains("-h") || pargs.contains("--help") {
        print_help();
        return Ok(());
    }

    // First free arg is the subcommand
    let subcmd: Option<String> = pargs.free_from_str().ok();

    match subcmd.as_deref() {
        Some("help") => {
            let topic: Option<String> = pargs.free_from_str().ok();
            if let Some(t) = topic {
                print_subcmd_help(&t);
            } else {
                print_help();
            }
            Ok(())
        }

        Some("replay") => {
            let opts = ReplayOptions {
                realtime: pargs.contains("--realtime"),
                adapter: pargs
                    .opt_value_from_str::<_, AdapterChoice>("--adapter")?
                    .unwrap_or_default(),
            };
            let profile_name: Option<String> = pargs.opt_value_from_str("--profile")?;
            let src: String = pargs
                .free_from_str()
                .map_err(|_| anyhow!("usage: dragverify replay <script.jsonl|-> [--realtime]"))?;

            let text = if src == "-" {
                let mut s = String::new();
                io::stdin().read_to_string(&mut s)?;
                s
            } else {
                fs::read_to_string(&src).map_err(|e| anyhow!("failed to read {src}: {e}"))?
            };
            let script = Script::parse(&text).map_err(|e| anyhow!("{src}: {e}"))?;
            info!("loaded {} script entries from {src}", script.entries.len());

            let (profile, urls) = resolve_profile(profile_name.as_deref())?;
            let mut sink = actions::sink_for(profile.redirect.mode);
            let summary = host::run_replay(
                &script,
                &opts,
                &profile,
                urls,
                Box::new(TextPresenter::stdout()),
                sink.as_mut(),
            );
            print_response(&serde_json::json!({
                "phase": format!("{:?}", summary.phase),
                "progress": summary.progress,
                "redirected": summary.redirected,
                "host_commands": summary.host_commands,
                "finished_at_ms": summary.finished_at_ms,
            }));
            Ok(())
        }

        Some("touch") => {
            let dev_path: Option<PathBuf> = pargs.opt_value_from_str("--device")?;
            let profile_name: Option<String> = pargs.opt_value_from_str("--profile")?;
            let (profile, urls) = resolve_profile(profile_name.as_deref())?;
            let (dev, info) = device::open_touch(dev_path.as_deref())?;

            let stop = Arc::new(AtomicBool::new(false));
            signal_hook::flag::register(SIGINT, Arc::clone(&stop))?;
            signal_hook::flag::register(SIGTERM, Arc::clone(&stop))?;

            let mut sink = actions::sink_for(profile.redirect.mode);
            host::run_touch(
                dev,
                &info,
                &profile,
                urls,
                Box::new(TextPresenter::stdout()),
                sink.as_mut(),
                stop,
            )
        }

        Some("use") => {
            let name: String = pargs
                .free_from_str()
                .map_err(|_| anyhow!("usage: dragverify use <profile_name>"))?;
            let mut cfg = ConfigState::load_or_install_default()?;
            cfg.set_active(&name)?;
            println!("active profile: {}", cfg.active_name);
            Ok(())
        }

        Some("list") => {
            let cfg = ConfigState::load_or_install_default()?;
            for name in cfg.list_profiles() {
                let mark = if name == cfg.active_name { "*" } else { " " };
                println!("{mark} {name}");
            }
            Ok(())
        }

        Some("check") => {
            let cfg = ConfigState::load_or_install_default()?;
            let name: String = pargs
                .free_from_str()
                .unwrap_or_else(|_| cfg.active_name.clone());
            let profile = cfg.load_named(&name)?;
            let urls = OutcomeUrls::from_env(&profile.outcome);
            let track = profile.track.geometry();
            print_response(&serde_json::json!({
                "profile": name,
                "name": profile.meta.name,
                "timing_ms": {
                    "success_redirect": profile.timing.success_redirect_ms,
                    "failure_display": profile.timing.failure_display_ms,
                    "failure_redirect": profile.timing.failure_redirect_ms,
                },
                "track": {
                    "origin_x": track.origin_x,
                    "width": track.width,
                    "handle_width": track.handle_width,
                    "travel": track.travel(),
                    "degenerate": track.is_degenerate(),
                },
                "outcome_urls": { "success": urls.success, "failure": urls.failure },
                "redirect_mode": format!("{:?}", profile.redirect.mode),
            }));
            Ok(())
        }

        Some("doctor") => {
            let cfg = ConfigState::load_or_install_default()?;
            print_response(&cfg.doctor_report());
            Ok(())
        }

        Some(other) => {
            eprintln!("unknown subcommand: {other}\n");
            print_help();
            Ok(())
        }

        None => {
            print_help();
            Ok(())
        }
    }
}

fn resolve_profile(name: Option<&str>) -> Result<(Profile, OutcomeUrls)> {
    let cfg = ConfigState::load_or_install_default()?;
    let profile = match name {
        Some(n) => cfg.load_named(n)?,
        None => cfg.profile,
    };
    let urls = OutcomeUrls::from_env(&profile.outcome);
    Ok((profile, urls))
}

fn print_help() {
    println!(
        r#"dragverify — slide-to-verify gesture widget

USAGE:
  dragverify help [command]                  Show general or command-specific help
  dragverify replay <script|-> [options]     Replay a recorded event script
  dragverify touch [--device PATH]           Drive the widget from a touchscreen
  dragverify list                            List profiles
  dragverify use <name>                      Switch active profile
  dragverify check [name]                    Validate and summarize a profile
  dragverify doctor                          Diagnose devices and configuration

TIPS:
  - Profiles: ~/.config/dragverify/profiles
  - Active profile pointer: ~/.config/dragverify/active
  - PUBLIC_SUCCESS_URL / PUBLIC_FAIL_URL override the profile's outcome URLs
"#
    );
}

fn print_subcmd_help(cmd: &str) {
    match cmd {
        "replay" => println!(
            "usage: dragverify replay <script.jsonl|-> [--realtime] [--adapter auto|pointer|mouse-touch] [--profile NAME]\n\
             One JSON object per line: {{\"at_ms\":0,\"event\":{{\"source\":\"pointer\",\"kind\":\"down\",\"pointer_id\":1,\"client_x\":30}}}}\n\
             or {{\"at_ms\":0,\"resize\":{{\"origin_x\":0,\"width\":300,\"handle_width\":60}}}}."
        ),
        "touch" => println!(
            "usage: dragverify touch [--device /dev/input/eventN] [--profile NAME]\n\
             Maps the first contact's X across the configured track. Ctrl-C stops."
        ),
        "list" => {
            println!("usage: dragverify list\nLists available profiles; marks active with '*'.")
        }
        "use" => {
            println!("usage: dragverify use <name>\nSwitches the active profile to <name>.")
        }
        "check" => println!(
            "usage: dragverify check [name]\nParses a profile (default: active) and prints the resolved settings."
        ),
        "doctor" => println!(
            "usage: dragverify doctor\nChecks permissions and lists detected multitouch devices."
        ),
        _ => {
            eprintln!("unknown command: {cmd}\n");
            print_help();
        }
    }
}

fn print_response(v: &serde_json::Value) {
    println!("{}", serde_json::to_string_pretty(v).unwrap_or_default());
}
