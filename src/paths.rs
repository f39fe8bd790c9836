use std::path::{Path, PathBuf};

pub fn out_spice(work_dir: impl AsRef<Path>, name: &str) -> PathBuf {
    PathBuf::from(work_dir.as_ref()).join(format!("{name}.spice"))
}

pub fn out_gds(work_dir: impl AsRef<Path>, name: &str) -> PathBuf {
    PathBuf::from(work_dir.as_ref()).join(format!("{name}.gds"))
}

pub fn out_stim(work_dir: impl AsRef<Path>, name: &str, corner: &str) -> PathBuf {
    PathBuf::from(work_dir.as_ref()).join(format!("{name}.{corner}.stim.sp"))
}

pub fn out_log(work_dir: impl AsRef<Path>, name: &str, corner: &str) -> PathBuf {
    PathBuf::from(work_dir.as_ref()).join(format!("{name}.{corner}.log"))
}
