//! Physical verification of memory designs.
//!
//! Netlisting, layout generation and the DRC/LVS tools are external
//! collaborators reached through traits. Error counts are accumulated in an
//! explicit [`VerificationTally`] owned by the caller.

use std::fs;
use std::path::Path;

use log::{info, warn};
use serde::{Deserialize, Serialize};

use crate::error::{CharzError, Result};
use crate::paths::{out_gds, out_spice};

pub trait NetlistWriter {
    fn write_netlist(&self, cell: &str, path: &Path) -> Result<()>;
}

pub trait LayoutWriter {
    fn write_layout(&self, cell: &str, path: &Path) -> Result<()>;
}

/// A geometric and connectivity checker. Both checks return an error count.
pub trait PhysicalVerifier {
    fn run_drc(&self, cell: &str, layout: &Path) -> Result<usize>;
    fn run_lvs(&self, cell: &str, layout: &Path, netlist: &Path) -> Result<usize>;
}

/// A named design that can be written out as a netlist and a layout.
pub struct Design<N, L> {
    pub name: String,
    pub netlist: N,
    pub layout: L,
}

impl<N: NetlistWriter, L: LayoutWriter> Design<N, L> {
    pub fn new(name: impl Into<String>, netlist: N, layout: L) -> Self {
        Self {
            name: name.into(),
            netlist,
            layout,
        }
    }

    pub fn write_netlist(&self, path: &Path) -> Result<()> {
        self.netlist.write_netlist(&self.name, path)
    }

    pub fn write_layout(&self, path: &Path) -> Result<()> {
        self.layout.write_layout(&self.name, path)
    }
}

#[derive(Debug, Copy, Clone, Default, Eq, PartialEq, Serialize, Deserialize)]
pub struct VerifyOpts {
    pub check_lvsdrc: bool,
}

/// Running totals of verification errors.
#[derive(Debug, Copy, Clone, Default, Eq, PartialEq, Serialize, Deserialize)]
pub struct VerificationTally {
    pub drc_errors: usize,
    pub lvs_errors: usize,
}

impl VerificationTally {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn total(&self) -> usize {
        self.drc_errors + self.lvs_errors
    }
}

fn check_count(check: &'static str, cell: &str, errors: usize) -> Result<()> {
    if errors > 0 {
        return Err(CharzError::VerificationFailed {
            check,
            cell: cell.to_string(),
            errors,
        });
    }
    Ok(())
}

fn remove_temp(path: &Path) {
    if let Err(e) = fs::remove_file(path) {
        warn!("failed to remove {:?}: {}", path, e);
    }
}

/// Runs DRC and LVS on `design`.
///
/// The netlist and layout are written to `work_dir` and removed afterwards.
/// Error counts are added to `tally` before any failure is reported.
pub fn verify_design<N, L, V>(
    design: &Design<N, L>,
    verifier: &V,
    work_dir: impl AsRef<Path>,
    opts: &VerifyOpts,
    tally: &mut VerificationTally,
) -> Result<()>
where
    N: NetlistWriter,
    L: LayoutWriter,
    V: PhysicalVerifier + ?Sized,
{
    if !opts.check_lvsdrc {
        warn!("skipping DRC and LVS for {}", design.name);
        return Ok(());
    }
    info!("running DRC and LVS for {}", design.name);

    let netlist = out_spice(&work_dir, &design.name);
    let layout = out_gds(&work_dir, &design.name);

    let counts = design
        .write_netlist(&netlist)
        .and_then(|_| design.write_layout(&layout))
        .and_then(|_| {
            let drc = verifier.run_drc(&design.name, &layout)?;
            let lvs = verifier.run_lvs(&design.name, &layout, &netlist)?;
            Ok((drc, lvs))
        });

    for path in [&netlist, &layout] {
        if path.exists() {
            remove_temp(path);
        }
    }

    let (drc, lvs) = counts?;
    tally.drc_errors += drc;
    tally.lvs_errors += lvs;

    check_count("DRC", &design.name, drc)?;
    check_count("LVS", &design.name, lvs)?;
    Ok(())
}

/// Runs DRC alone on `design`.
pub fn verify_drc<N, L, V>(
    design: &Design<N, L>,
    verifier: &V,
    work_dir: impl AsRef<Path>,
    opts: &VerifyOpts,
    tally: &mut VerificationTally,
) -> Result<()>
where
    N: NetlistWriter,
    L: LayoutWriter,
    V: PhysicalVerifier + ?Sized,
{
    if !opts.check_lvsdrc {
        warn!("skipping DRC for {}", design.name);
        return Ok(());
    }
    info!("running DRC for {}", design.name);

    let layout = out_gds(&work_dir, &design.name);
    let count = design
        .write_layout(&layout)
        .and_then(|_| verifier.run_drc(&design.name, &layout));
    if layout.exists() {
        remove_temp(&layout);
    }

    let drc = count?;
    tally.drc_errors += drc;
    check_count("DRC", &design.name, drc)
}

/// Runs LVS alone on `design`.
pub fn verify_lvs<N, L, V>(
    design: &Design<N, L>,
    verifier: &V,
    work_dir: impl AsRef<Path>,
    opts: &VerifyOpts,
    tally: &mut VerificationTally,
) -> Result<()>
where
    N: NetlistWriter,
    L: LayoutWriter,
    V: PhysicalVerifier + ?Sized,
{
    if !opts.check_lvsdrc {
        warn!("skipping LVS for {}", design.name);
        return Ok(());
    }
    info!("running LVS for {}", design.name);

    let netlist = out_spice(&work_dir, &design.name);
    let layout = out_gds(&work_dir, &design.name);
    let count = design
        .write_netlist(&netlist)
        .and_then(|_| design.write_layout(&layout))
        .and_then(|_| verifier.run_lvs(&design.name, &layout, &netlist));
    for path in [&netlist, &layout] {
        if path.exists() {
            remove_temp(path);
        }
    }

    let lvs = count?;
    tally.lvs_errors += lvs;
    check_count("LVS", &design.name, lvs)
}

#[cfg(test)]
mod tests {
    use std::cell::RefCell;
    use std::path::PathBuf;

    use super::*;

    struct TextWriter(&'static str);

    impl NetlistWriter for TextWriter {
        fn write_netlist(&self, cell: &str, path: &Path) -> Result<()> {
            fs::write(path, format!(".subckt {cell}\n{}\n.ends\n", self.0))?;
            Ok(())
        }
    }

    impl LayoutWriter for TextWriter {
        fn write_layout(&self, cell: &str, path: &Path) -> Result<()> {
            fs::write(path, format!("{cell}: {}", self.0))?;
            Ok(())
        }
    }

    struct MockVerifier {
        drc: usize,
        lvs: usize,
        seen: RefCell<Vec<PathBuf>>,
    }

    impl MockVerifier {
        fn new(drc: usize, lvs: usize) -> Self {
            Self {
                drc,
                lvs,
                seen: RefCell::new(Vec::new()),
            }
        }
    }

    impl PhysicalVerifier for MockVerifier {
        fn run_drc(&self, _cell: &str, layout: &Path) -> Result<usize> {
            assert!(layout.exists());
            self.seen.borrow_mut().push(layout.to_path_buf());
            Ok(self.drc)
        }

        fn run_lvs(&self, _cell: &str, layout: &Path, netlist: &Path) -> Result<usize> {
            assert!(layout.exists() && netlist.exists());
            self.seen.borrow_mut().push(netlist.to_path_buf());
            Ok(self.lvs)
        }
    }

    fn design() -> Design<TextWriter, TextWriter> {
        Design::new("bitcell", TextWriter("netlist"), TextWriter("layout"))
    }

    #[test]
    fn test_verify_clean_design() {
        let dir = tempfile::tempdir().unwrap();
        let verifier = MockVerifier::new(0, 0);
        let mut tally = VerificationTally::new();
        let opts = VerifyOpts { check_lvsdrc: true };

        verify_design(&design(), &verifier, dir.path(), &opts, &mut tally).unwrap();

        assert_eq!(tally.total(), 0);
        assert_eq!(verifier.seen.borrow().len(), 2);
        for path in verifier.seen.borrow().iter() {
            assert!(!path.exists());
        }
    }

    #[test]
    fn test_errors_accumulate() {
        let dir = tempfile::tempdir().unwrap();
        let opts = VerifyOpts { check_lvsdrc: true };
        let mut tally = VerificationTally::new();

        let err = verify_design(
            &design(),
            &MockVerifier::new(2, 1),
            dir.path(),
            &opts,
            &mut tally,
        )
        .unwrap_err();
        assert!(matches!(
            err,
            CharzError::VerificationFailed {
                check: "DRC",
                errors: 2,
                ..
            }
        ));

        let _ = verify_drc(&design(), &MockVerifier::new(3, 0), dir.path(), &opts, &mut tally);
        assert_eq!(
            tally,
            VerificationTally {
                drc_errors: 5,
                lvs_errors: 1,
            }
        );
        assert!(!out_gds(dir.path(), "bitcell").exists());
    }

    #[test]
    fn test_verify_lvs_alone() {
        let dir = tempfile::tempdir().unwrap();
        let opts = VerifyOpts { check_lvsdrc: true };
        let mut tally = VerificationTally::new();

        let verifier = MockVerifier::new(7, 4);
        let err = verify_lvs(&design(), &verifier, dir.path(), &opts, &mut tally).unwrap_err();
        assert!(matches!(
            err,
            CharzError::VerificationFailed {
                check: "LVS",
                errors: 4,
                ..
            }
        ));
        assert_eq!(
            tally,
            VerificationTally {
                drc_errors: 0,
                lvs_errors: 4,
            }
        );
        assert_eq!(
            *verifier.seen.borrow(),
            vec![out_spice(dir.path(), "bitcell")]
        );
        assert!(!out_spice(dir.path(), "bitcell").exists());
        assert!(!out_gds(dir.path(), "bitcell").exists());

        verify_lvs(
            &design(),
            &MockVerifier::new(0, 0),
            dir.path(),
            &opts,
            &mut tally,
        )
        .unwrap();
        assert_eq!(tally.total(), 4);
    }

    #[test]
    fn test_skipped_when_disabled() {
        let dir = tempfile::tempdir().unwrap();
        let verifier = MockVerifier::new(10, 10);
        let mut tally = VerificationTally::new();

        verify_design(
            &design(),
            &verifier,
            dir.path(),
            &VerifyOpts::default(),
            &mut tally,
        )
        .unwrap();

        assert!(verifier.seen.borrow().is_empty());
        assert_eq!(tally.total(), 0);
    }
}
