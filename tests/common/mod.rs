use anyhow::Result;
use std::fs;
use std::os::unix::fs::PermissionsExt;
use std::path::{Path, PathBuf};
use tempfile::TempDir;

/// A modulecmd stand-in that answers the queries the tests make.
pub const FAKE_MODULECMD: &str = r#"#!/bin/bash
[ "$1" = python ] && shift
case "$1" in
  list) exit 0 ;;
  show)
    case "$2" in
      gcc/8.1.0)
        cat >&2 <<'EOF'
-------------------------------------------------------------------
/opt/modulefiles/gcc/8.1.0:

module-whatis    GNU compiler suite
conflict         intel
prepend-path     LD_LIBRARY_PATH /opt/gcc/8.1.0/lib64
prepend-path     PATH /opt/gcc/8.1.0/bin
-------------------------------------------------------------------
EOF
        ;;
      empty) ;;
      *)
        echo "ERROR: Unable to locate a modulefile for '$2'" >&2
        exit 1
        ;;
    esac
    ;;
  avail)
    printf 'PrgEnv-gnu/6.0.4\ngcc/7.3.0\ngcc/8.1.0\n' >&2
    ;;
  unload) echo "del os.environ['INTEL_LICENSE_FILE']" ;;
  load)
    echo "os.environ['CC'] = 'gcc'"
    echo "os.environ['MODSHIM_E2E_ROOT'] = '/opt/gcc/8.1.0'"
    ;;
  *) exit 1 ;;
esac
"#;

/// Scratch HOME, XDG directories, a private PATH entry and a fake login shell.
pub struct TestEnvironment {
    temp_dir: TempDir,
}

impl TestEnvironment {
    pub fn new() -> Result<Self> {
        let temp_dir = tempfile::tempdir()?;
        for dir in ["bin", "home", "config", "data", "tools"] {
            fs::create_dir_all(temp_dir.path().join(dir))?;
        }
        let env = Self { temp_dir };
        env.set_shell_init("")?;
        Ok(env)
    }

    pub fn path(&self) -> &Path {
        self.temp_dir.path()
    }

    /// Directory put in front of PATH for modshim
    pub fn bin_dir(&self) -> PathBuf {
        self.path().join("bin")
    }

    /// Directory outside PATH, for commands only reachable through a function
    pub fn tools_dir(&self) -> PathBuf {
        self.path().join("tools")
    }

    pub fn home(&self) -> PathBuf {
        self.path().join("home")
    }

    pub fn config_home(&self) -> PathBuf {
        self.path().join("config")
    }

    pub fn data_home(&self) -> PathBuf {
        self.path().join("data")
    }

    pub fn shell(&self) -> PathBuf {
        self.path().join("loginshell")
    }

    pub fn write_executable(&self, path: &Path, content: &str) -> Result<()> {
        fs::write(path, content)?;
        fs::set_permissions(path, fs::Permissions::from_mode(0o755))?;
        Ok(())
    }

    /// Install the fake modulecmd on PATH.
    pub fn install_modulecmd(&self) -> Result<PathBuf> {
        let path = self.bin_dir().join("modulecmd");
        self.write_executable(&path, FAKE_MODULECMD)?;
        Ok(path)
    }

    /// Replace the login shell; `init` plays the role of the user's profile.
    pub fn set_shell_init(&self, init: &str) -> Result<()> {
        let script = format!(
            "#!/bin/bash\n\
             while [ \"$#\" -gt 0 ] && [ \"$1\" != \"-c\" ]; do shift; done\n\
             shift\n\
             {init}\n\
             eval \"$1\"\n"
        );
        self.write_executable(&self.shell(), &script)
    }

    pub fn write_file(&self, name: &str, content: &str) -> Result<PathBuf> {
        let path = self.path().join(name);
        fs::write(&path, content)?;
        Ok(path)
    }
}
