//! `[autoexec]` script generation: drive mounts, DOS path translation and the launch sequence

#[cfg(test)]
mod tests;

use crate::item::LaunchTweaks;
use crate::mount::{self, MountSpec};

/// The program started by an autoexec script.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProgramLaunch {
    /// Executable path relative to the item root
    pub path: String,
    pub params: String,
    pub tweaks: LaunchTweaks,
    /// Whether this is the item's main program; user pre/post commands only run for it
    pub is_main: bool,
}

impl ProgramLaunch {
    #[must_use]
    pub fn new(path: impl Into<String>) -> Self {
        Self {
            path: path.into(),
            params: String::new(),
            tweaks: LaunchTweaks::default(),
            is_main: false,
        }
    }
}

#[derive(Debug, Clone, Default)]
pub struct AutoexecBuilder {
    mounts: Vec<MountSpec>,
    program: Option<ProgramLaunch>,
    pre_commands: Vec<String>,
    post_commands: Vec<String>,
    auto_exit: bool,
}

impl AutoexecBuilder {
    /// Mounts are emitted in order; the first directory mount of C: defines the mount root.
    #[must_use]
    pub fn new(mounts: Vec<MountSpec>) -> Self {
        Self { mounts, ..Self::default() }
    }

    /// Launch a program after mounting. Without a program the script stops at the DOS prompt.
    #[must_use]
    pub fn program(mut self, program: ProgramLaunch) -> Self {
        self.program = Some(program);
        self
    }

    #[must_use]
    pub fn pre_commands(mut self, commands: Vec<String>) -> Self {
        self.pre_commands = commands;
        self
    }

    #[must_use]
    pub fn post_commands(mut self, commands: Vec<String>) -> Self {
        self.post_commands = commands;
        self
    }

    /// Append `exit` after the program so the emulator closes when it returns.
    #[must_use]
    pub fn auto_exit(mut self, auto_exit: bool) -> Self {
        self.auto_exit = auto_exit;
        self
    }

    #[must_use]
    pub fn build(&self) -> AutoexecScript {
        let mut lines: Vec<String> = self.mounts.iter().filter_map(MountSpec::command).collect();
        lines.push("c:".into());

        let Some(program) = &self.program else {
            return AutoexecScript { lines };
        };

        if program.is_main {
            lines.extend(self.pre_commands.iter().cloned());
        }

        let (dir, file) = translate_path(mount::mount_root(&self.mounts), &program.path);
        if !dir.is_empty() {
            lines.push(format!("cd \\{dir}"));
        }
        lines.push(launch_line(file, &program.params, program.tweaks));

        if program.is_main {
            lines.extend(self.post_commands.iter().cloned());
        }

        if self.auto_exit {
            lines.push("exit".into());
        }

        AutoexecScript { lines }
    }
}

/// Split an item-relative executable path into the DOS directory (backslash-separated, relative
/// to C:) and the file name.
///
/// The mount root prefix is stripped case-insensitively. A path outside the mount root is used
/// as-is.
#[must_use]
pub fn translate_path(mount_root: &str, path: &str) -> (String, String) {
    let root = mount_root.replace('\\', "/");
    let root = root.trim_matches('/');
    let root = if root == "." { "" } else { root.trim_start_matches("./") };

    let path = path.trim().replace('\\', "/");
    let path = path.trim_start_matches("./");

    let internal = if !root.is_empty()
        && path.len() > root.len()
        && path.as_bytes()[root.len()] == b'/'
        && path[..root.len()].eq_ignore_ascii_case(root)
    {
        &path[root.len() + 1..]
    } else {
        path
    };
    let internal = internal.trim_start_matches('/');

    match internal.rsplit_once('/') {
        Some((dir, file)) => (dir.replace('/', "\\"), file.into()),
        None => (String::new(), internal.into()),
    }
}

fn is_batch_file(file: &str) -> bool {
    file.to_ascii_lowercase().ends_with(".bat")
}

fn launch_line(file: String, params: &str, tweaks: LaunchTweaks) -> String {
    let batch = is_batch_file(&file);

    let params = params.trim();
    let mut line = file;
    if !params.is_empty() {
        line.push(' ');
        line.push_str(params);
    }

    if batch {
        return format!("call {line}");
    }

    if let Some(size) = tweaks.loadfix {
        line = format!("loadfix -{size} {line}");
    }
    if tweaks.loadhigh {
        line = format!("lh {line}");
    }

    line
}

/// Generated autoexec commands.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AutoexecScript {
    lines: Vec<String>,
}

impl AutoexecScript {
    #[must_use]
    pub fn lines(&self) -> &[String] {
        &self.lines
    }

    /// Render as a config layer holding only the `[autoexec]` section.
    #[must_use]
    pub fn render(&self) -> String {
        let mut out = String::from("[autoexec]\n");
        for line in &self.lines {
            out.push_str(line);
            out.push('\n');
        }
        out
    }
}
