use std::path::PathBuf;
use std::process::Command;

fn main() -> Result<(), Box<dyn std::error::Error>> {
    let out_dir = PathBuf::from(std::env::var("OUT_DIR")?);
    let descriptor_set = out_dir.join("driver_descriptor.bin");

    let protoc = match std::env::var_os("PROTOC") {
        Some(path) => PathBuf::from(path),
        None => protoc_bin_vendored::protoc_bin_path()?,
    };

    let status = Command::new(&protoc)
        .arg("--include_imports")
        .arg("--include_source_info")
        .arg("-I")
        .arg("proto")
        .arg("-o")
        .arg(&descriptor_set)
        .arg("proto/driver.proto")
        .status()?;
    if !status.success() {
        return Err(format!("{} failed: {status}", protoc.display()).into());
    }

    tonic_build::configure()
        .file_descriptor_set_path(&descriptor_set)
        .skip_protoc_run()
        .compile(&["proto/driver.proto"], &["proto"])?;
    Ok(())
}
