#![cfg(unix)]

use dosdeck_driver::process::{self, LaunchState, LaunchStatus};
use dosdeck_driver::{
    ItemStore, JsonItemStore, LaunchContext, LaunchRequest, LauncherConfig, build_command_line,
};
use std::fs;
use std::os::unix::fs::PermissionsExt;
use std::path::Path;
use std::sync::mpsc;
use std::time::Duration;

const REFERENCE: &str = "\
# This is the configuration file for DOSBox Staging (0.81.1).

[sdl]
fullscreen = false

[dosbox]
memsize = 16

[capture]
capture_dir = capture

[cpu]
cpu_cycles = 3000
cpu_cycles_protected = 60000

[autoexec]
";

const MAPPINGS: &str = r#"{
    "cpu": {
        "cycles": {
            "staging": {
                "section": "cpu",
                "key": "cpu_cycles",
                "protected_key": "cpu_cycles_protected"
            }
        }
    }
}"#;

const RECORD: &str = r#"{
    "title": "Commander Keen 4",
    "executables": {
        "KEEN4E.EXE": {"role": "main", "title": "Keen 4", "params": ""}
    },
    "dosbox_settings": {"cpu": {"cycles": "20000"}, "dosbox": {"memsize": "16"}},
    "engine": "dosbox-staging",
    "play_count": 4
}"#;

/// Stand-in emulator that records its arguments and the layer contents it was given.
const FAKE_EMULATOR: &str = r#"#!/bin/sh
printf '%s\n' "$@" > args.txt
while [ "$#" -gt 0 ]; do
    if [ "$1" = "-conf" ]; then
        cat "$2" >> layers.txt
        echo "---" >> layers.txt
        shift
    fi
    shift
done
"#;

fn write(path: &Path, contents: &str) {
    fs::create_dir_all(path.parent().unwrap()).unwrap();
    fs::write(path, contents).unwrap();
}

#[test]
fn plan_write_and_launch() {
    let dir = tempfile::tempdir().unwrap();
    let base = dir.path();

    let emulator = base.join("engines/dosbox-staging/dosbox");
    write(&emulator, FAKE_EMULATOR);
    fs::set_permissions(&emulator, fs::Permissions::from_mode(0o755)).unwrap();
    write(&base.join("engines/dosbox-staging/dosbox-staging.conf"), REFERENCE);
    write(&base.join("database/key-mappings.json"), MAPPINGS);
    write(&base.join("database/games_datainfo/keen4/keen4.json"), RECORD);
    write(&base.join("games/keen4/KEEN4E.EXE"), "MZ");

    let config_path = base.join("dosdeck.toml");
    let config_toml = format!(
        "base_dir = {base:?}\n\
         poll_interval_ms = 10\n\
         \n\
         [[engines]]\n\
         name = \"Staging\"\n\
         path = {emulator:?}\n"
    );
    fs::write(&config_path, config_toml).unwrap();

    let config = LauncherConfig::from_file(&config_path);
    assert_eq!(1, config.engines.len());

    let store = JsonItemStore::from_config(&config);
    let record = store.item("keen4").unwrap();
    assert_eq!("keen4", record.id);

    let mut context = LaunchContext::new(config.clone()).unwrap();
    let status = LaunchStatus::new();
    status.set(LaunchState::Planning);

    let request =
        LaunchRequest { auto_exit: true, protected_mode: Some(false), ..LaunchRequest::default() };
    let plan = context.plan(&record, &request).unwrap();
    assert_eq!("[cpu]\ncpu_cycles = 20000", plan.overrides.serialize());

    let layers = plan.write_layers(&config.work_dir()).unwrap();
    let command = build_command_line(&plan, &layers);

    let (sender, receiver) = mpsc::channel();
    let handle = process::spawn_monitored(
        &command,
        &plan.working_dir,
        config.poll_interval(),
        status.clone(),
        move |outcome| sender.send(*outcome).unwrap(),
    )
    .unwrap();

    let outcome = receiver.recv_timeout(Duration::from_secs(10)).unwrap();
    assert!(outcome.success());
    assert_eq!(Some(outcome), handle.wait());
    assert_eq!(LaunchState::Finished, status.get());

    let game_dir = base.join("games/keen4");
    let args = fs::read_to_string(game_dir.join("args.txt")).unwrap();
    let expected_args = format!(
        "-conf\n{}\n-conf\n{}\n",
        layers.overrides.display(),
        layers.autoexec.display()
    );
    assert_eq!(expected_args, args);

    let layer_contents = fs::read_to_string(game_dir.join("layers.txt")).unwrap();
    assert_eq!(
        "[cpu]\ncpu_cycles = 20000---\n[autoexec]\nmount c \".\"\nc:\nKEEN4E.EXE\nexit\n---\n",
        layer_contents
    );

    layers.cleanup();
    assert!(!layers.overrides.exists());

    let record = store.record_session("keen4", &outcome).unwrap();
    assert_eq!(5, record.play_count);
    assert!(record.last_played.is_some());
    assert_eq!("Commander Keen 4", record.title);
}
