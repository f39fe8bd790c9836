use std::fs::{self, File};
use std::path::{Path, PathBuf};
use std::process::Command;

use log::info;

use crate::config::Corner;
use crate::error::{CharzError, Result};
use crate::measure::SimResults;

/// Runs a stimulus deck and reports its measurement results.
pub trait Simulator {
    fn simulate(&self, deck: &Path, corner: &Corner) -> Result<SimResults>;
}

/// Runs ngspice in batch mode.
#[derive(Debug, Clone)]
pub struct Ngspice {
    work_dir: PathBuf,
    binary: PathBuf,
}

pub struct NgspiceGeneratedPaths {
    pub log_path: PathBuf,
    pub stdout_path: PathBuf,
    pub stderr_path: PathBuf,
}

impl Ngspice {
    pub fn new(work_dir: impl Into<PathBuf>) -> Self {
        Self {
            work_dir: work_dir.into(),
            binary: PathBuf::from("ngspice"),
        }
    }

    /// Uses `binary` instead of the `ngspice` found on the search path.
    pub fn with_binary(mut self, binary: impl Into<PathBuf>) -> Self {
        self.binary = binary.into();
        self
    }

    pub fn generate_paths(&self, corner: &Corner) -> NgspiceGeneratedPaths {
        let name = corner.name();
        NgspiceGeneratedPaths {
            log_path: self.work_dir.join(format!("ngspice.{name}.log")),
            stdout_path: self.work_dir.join(format!("ngspice.{name}.out")),
            stderr_path: self.work_dir.join(format!("ngspice.{name}.err")),
        }
    }
}

impl Simulator for Ngspice {
    fn simulate(&self, deck: &Path, corner: &Corner) -> Result<SimResults> {
        fs::create_dir_all(&self.work_dir)?;
        // ngspice runs inside the work directory, so relative paths must be
        // resolved against the caller's directory first.
        let work_dir = fs::canonicalize(&self.work_dir)?;
        let deck = fs::canonicalize(deck)?;
        let sim = Self {
            work_dir: work_dir.clone(),
            binary: self.binary.clone(),
        };
        let paths = sim.generate_paths(corner);

        let out_file = File::create(&paths.stdout_path)?;
        let err_file = File::create(&paths.stderr_path)?;

        info!("simulating {:?} at corner {}", deck, corner.name());
        let status = Command::new(&self.binary)
            .arg("-b")
            .arg("-o")
            .arg(&paths.log_path)
            .arg(&deck)
            .stdout(out_file)
            .stderr(err_file)
            .current_dir(&work_dir)
            .status()?;

        if !status.success() {
            return Err(CharzError::Simulator(format!(
                "ngspice exited unsuccessfully ({status}); see {:?}",
                paths.stderr_path
            )));
        }

        let log = fs::read_to_string(&paths.log_path)?;
        Ok(SimResults::parse(&log))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_generated_paths() {
        let corner = Corner {
            process: "tt".to_string(),
            vdd: 1.8,
            temperature: 25.0,
        };
        let paths = Ngspice::new("/tmp/charz").generate_paths(&corner);
        assert_eq!(
            paths.log_path,
            PathBuf::from("/tmp/charz/ngspice.tt_1p8v_25c.log")
        );
    }

    #[test]
    fn test_missing_binary() {
        let dir = tempfile::tempdir().unwrap();
        let corner = Corner {
            process: "tt".to_string(),
            vdd: 1.8,
            temperature: 25.0,
        };
        let deck = dir.path().join("deck.sp");
        fs::write(&deck, "* empty\n").unwrap();
        let sim = Ngspice::new(dir.path()).with_binary(dir.path().join("no-such-ngspice"));
        assert!(matches!(
            sim.simulate(&deck, &corner),
            Err(CharzError::Io(_))
        ));
    }

    #[test]
    fn test_missing_deck() {
        let dir = tempfile::tempdir().unwrap();
        let corner = Corner {
            process: "tt".to_string(),
            vdd: 1.8,
            temperature: 25.0,
        };
        let sim = Ngspice::new(dir.path());
        assert!(matches!(
            sim.simulate(&dir.path().join("deck.sp"), &corner),
            Err(CharzError::Io(_))
        ));
    }

    #[cfg(unix)]
    #[test]
    fn test_relative_work_dir() {
        use std::os::unix::fs::PermissionsExt;

        let corner = Corner {
            process: "ff".to_string(),
            vdd: 1.98,
            temperature: 100.0,
        };
        let bin_dir = tempfile::tempdir().unwrap();
        let binary = bin_dir.path().join("fake-ngspice");
        fs::write(
            &binary,
            "#!/bin/sh\n\
             [ -f \"$4\" ] || { echo \"deck $4 missing in $(pwd)\" >&2; exit 1; }\n\
             echo \"tpd0 = 1.5n\" > \"$3\"\n",
        )
        .unwrap();
        fs::set_permissions(&binary, fs::Permissions::from_mode(0o755)).unwrap();

        let work = tempfile::tempdir_in(".").unwrap();
        let rel = PathBuf::from(work.path().file_name().unwrap());
        assert!(rel.is_relative());
        let deck = rel.join("deck.sp");
        fs::write(&deck, "* deck\n").unwrap();

        let sim = Ngspice::new(&rel).with_binary(&binary);
        let results = sim.simulate(&deck, &corner).unwrap();
        let tpd = results.get("tpd", Some(0)).unwrap().value().unwrap();
        approx::assert_relative_eq!(tpd, 1.5e-9, max_relative = 1e-12);
        assert!(rel.join("ngspice.ff_1p98v_100c.log").exists());
    }
}
