use super::*;
use test_log::test;

fn program(path: &str) -> ProgramLaunch {
    ProgramLaunch::new(path)
}

fn main_program(path: &str) -> ProgramLaunch {
    ProgramLaunch { is_main: true, ..ProgramLaunch::new(path) }
}

#[test]
fn path_translation_from_mount_root() {
    let split = |dir: &str, file: &str| (dir.to_string(), file.to_string());

    assert_eq!(split("sub", "run.exe"), translate_path("apps/main", "apps/main/sub/run.exe"));
    assert_eq!(split("", "run.exe"), translate_path(".", "run.exe"));
    assert_eq!(split("", "RUN.EXE"), translate_path("Apps\\Main\\", "apps/main/RUN.EXE"));
    assert_eq!(split("GAME\\BIN", "GAME.EXE"), translate_path(".", "GAME\\BIN\\GAME.EXE"));
    assert_eq!(split("BIN", "GAME.EXE"), translate_path("./drives/c", "drives/c/BIN/GAME.EXE"));
}

#[test]
fn path_outside_mount_root_is_kept() {
    assert_eq!(
        ("apps\\mainframe".into(), "run.exe".into()),
        translate_path("apps/main", "apps/mainframe/run.exe")
    );
    assert_eq!(("other".into(), "x.exe".into()), translate_path("apps", "other/x.exe"));
}

#[test]
fn full_sequence_for_main_program() {
    let script = AutoexecBuilder::new(vec![
        MountSpec::directory('c', "apps/main").with_label("GAME"),
        MountSpec::image('d', vec!["cd/disc.cue".into()]),
    ])
    .program(ProgramLaunch { params: "-nosound".into(), ..main_program("apps/main/sub/run.exe") })
    .pre_commands(vec!["set BLASTER=A220 I7 D1".into()])
    .post_commands(vec!["echo done".into()])
    .auto_exit(true)
    .build();

    assert_eq!(
        vec![
            r#"mount c "apps/main" -label "GAME""#,
            r#"imgmount d "cd/disc.cue" -t iso"#,
            "c:",
            "set BLASTER=A220 I7 D1",
            r"cd \sub",
            "run.exe -nosound",
            "echo done",
            "exit",
        ],
        script.lines()
    );
}

#[test]
fn root_level_program_has_no_cd() {
    let script = AutoexecBuilder::new(vec![MountSpec::directory('c', ".")])
        .program(program("run.exe"))
        .build();

    assert_eq!(vec![r#"mount c ".""#, "c:", "run.exe"], script.lines());
}

#[test]
fn user_commands_only_for_main_program() {
    let builder = AutoexecBuilder::new(vec![MountSpec::directory('c', ".")])
        .pre_commands(vec!["echo pre".into()])
        .post_commands(vec!["echo post".into()]);

    let setup = builder.clone().program(program("SETUP.EXE")).build();
    assert_eq!(vec![r#"mount c ".""#, "c:", "SETUP.EXE"], setup.lines());

    let main = builder.program(main_program("GAME.EXE")).build();
    assert_eq!(vec![r#"mount c ".""#, "c:", "echo pre", "GAME.EXE", "echo post"], main.lines());
}

#[test]
fn batch_files_are_called() {
    for path in ["START.BAT", "bin/start.bat", "Run.Bat"] {
        let script = AutoexecBuilder::new(vec![]).program(program(path)).build();
        let launch = script.lines().last().unwrap();
        assert!(launch.starts_with("call "), "{path}: {launch}");
    }

    let script = AutoexecBuilder::new(vec![])
        .program(ProgramLaunch {
            params: "/fast".into(),
            tweaks: LaunchTweaks { loadfix: Some(64), loadhigh: true },
            ..program("GO.BAT")
        })
        .build();
    assert_eq!("call GO.BAT /fast", script.lines().last().unwrap());
}

#[test]
fn launch_tweaks() {
    let build = |tweaks| {
        AutoexecBuilder::new(vec![])
            .program(ProgramLaunch { tweaks, ..program("GAME.EXE") })
            .build()
            .lines()
            .last()
            .cloned()
            .unwrap()
    };

    assert_eq!("loadfix -64 GAME.EXE", build(LaunchTweaks { loadfix: Some(64), loadhigh: false }));
    assert_eq!("lh GAME.EXE", build(LaunchTweaks { loadfix: None, loadhigh: true }));
    assert_eq!(
        "lh loadfix -32 GAME.EXE",
        build(LaunchTweaks { loadfix: Some(32), loadhigh: true })
    );
}

#[test]
fn dos_prompt_only_mounts() {
    let script = AutoexecBuilder::new(vec![MountSpec::directory('c', "drives/c")])
        .pre_commands(vec!["echo pre".into()])
        .auto_exit(true)
        .build();

    assert_eq!(vec![r#"mount c "drives/c""#, "c:"], script.lines());
}

#[test]
fn no_exit_without_auto_exit() {
    let script = AutoexecBuilder::new(vec![]).program(main_program("GAME.EXE")).build();
    assert!(!script.lines().iter().any(|line| line == "exit"));
}

#[test]
fn mount_root_defaults_to_item_root() {
    let script = AutoexecBuilder::new(vec![MountSpec::directory('d', "data")])
        .program(program("data/GAME.EXE"))
        .build();

    assert_eq!(vec![r#"mount d "data""#, "c:", r"cd \data", "GAME.EXE"], script.lines());
}

#[test]
fn render_layer() {
    let script = AutoexecBuilder::new(vec![MountSpec::directory('c', ".")])
        .program(program("GAME.EXE"))
        .auto_exit(true)
        .build();

    assert_eq!("[autoexec]\nmount c \".\"\nc:\nGAME.EXE\nexit\n", script.render());
}
