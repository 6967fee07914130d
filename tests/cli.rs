use ebcot_rs::block_file::{read_block, write_block};
use ebcot_rs::{CodeBlockEncoder, CodeBlockStyle, CodingParameters, SubbandOrientation};
use std::fs;
use std::path::Path;
use std::process::Command;

fn ebcot() -> Command {
    Command::new(env!("CARGO_BIN_EXE_ebcot"))
}

fn write_plane(path: &Path, plane: &[i32]) {
    let bytes: Vec<u8> = plane.iter().flat_map(|v| v.to_le_bytes()).collect();
    fs::write(path, bytes).unwrap();
}

fn read_plane(path: &Path) -> Vec<i32> {
    fs::read(path)
        .unwrap()
        .chunks_exact(4)
        .map(|b| i32::from_le_bytes([b[0], b[1], b[2], b[3]]))
        .collect()
}

fn test_plane() -> Vec<i32> {
    (0..12 * 10).map(|i: i32| ((i * 29) % 61) - 30).collect()
}

#[test]
fn test_block_file_on_disk() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("block.t1");
    let params = CodingParameters {
        orientation: SubbandOrientation::LH,
        style: CodeBlockStyle::TERMALL | CodeBlockStyle::VSC,
        ..Default::default()
    };
    let block = CodeBlockEncoder::new()
        .encode(&params, 12, 10, &test_plane())
        .unwrap();
    fs::write(&path, write_block(&block).unwrap()).unwrap();
    assert_eq!(read_block(&fs::read(&path).unwrap()).unwrap(), block);
}

#[test]
fn test_cli_encode_decode() {
    let dir = tempfile::tempdir().unwrap();
    let plane_path = dir.path().join("plane.raw");
    let block_path = dir.path().join("block.t1");
    let out_path = dir.path().join("out.raw");
    let plane = test_plane();
    write_plane(&plane_path, &plane);

    let status = ebcot()
        .args(["encode", "-i"])
        .arg(&plane_path)
        .arg("-o")
        .arg(&block_path)
        .args(["-w", "12", "-H", "10", "--orientation", "hh", "--bypass", "--segsym"])
        .status()
        .unwrap();
    assert!(status.success());

    let block = read_block(&fs::read(&block_path).unwrap()).unwrap();
    assert_eq!(block.orientation, SubbandOrientation::HH);
    assert_eq!(block.style, CodeBlockStyle::BYPASS | CodeBlockStyle::SEGSYM);

    let status = ebcot()
        .args(["decode", "-i"])
        .arg(&block_path)
        .arg("-o")
        .arg(&out_path)
        .status()
        .unwrap();
    assert!(status.success());
    assert_eq!(read_plane(&out_path), plane);

    let output = ebcot().args(["info", "-i"]).arg(&block_path).output().unwrap();
    assert!(output.status.success());
    let text = String::from_utf8_lossy(&output.stdout);
    assert!(text.contains("Dimensions:  12x10"));
    assert!(text.contains("Cleanup"));
}

#[test]
fn test_cli_truncated_decode() {
    let dir = tempfile::tempdir().unwrap();
    let plane_path = dir.path().join("plane.raw");
    let block_path = dir.path().join("block.t1");
    let out_path = dir.path().join("out.raw");
    let plane = test_plane();
    write_plane(&plane_path, &plane);

    let status = ebcot()
        .args(["encode", "-i"])
        .arg(&plane_path)
        .arg("-o")
        .arg(&block_path)
        .args(["-w", "12", "-H", "10", "--termall"])
        .status()
        .unwrap();
    assert!(status.success());

    let status = ebcot()
        .args(["decode", "--passes", "1", "-i"])
        .arg(&block_path)
        .arg("-o")
        .arg(&out_path)
        .status()
        .unwrap();
    assert!(status.success());
    let decoded = read_plane(&out_path);
    assert_eq!(decoded.len(), plane.len());
    // Only the top bit-plane (16) is known after one pass.
    for (d, p) in decoded.iter().zip(&plane) {
        assert_eq!(*d, if p.abs() >= 16 { p.signum() * 16 } else { 0 });
    }
}

#[test]
fn test_cli_reports_errors() {
    let dir = tempfile::tempdir().unwrap();
    let plane_path = dir.path().join("plane.raw");
    write_plane(&plane_path, &[1, 2, 3]);

    let output = ebcot()
        .args(["encode", "-i"])
        .arg(&plane_path)
        .arg("-o")
        .arg(dir.path().join("block.t1"))
        .args(["-w", "2", "-H", "2"])
        .output()
        .unwrap();
    assert_eq!(output.status.code(), Some(1));
    assert!(String::from_utf8_lossy(&output.stderr).starts_with("Error:"));

    let bogus = dir.path().join("bogus.t1");
    fs::write(&bogus, b"not a block").unwrap();
    let output = ebcot().args(["info", "-i"]).arg(&bogus).output().unwrap();
    assert_eq!(output.status.code(), Some(1));
}
