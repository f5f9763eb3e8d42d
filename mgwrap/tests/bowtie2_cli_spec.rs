#![cfg(unix)]

use anyhow::Result;
use assert_cmd::prelude::*;
use predicates::prelude::*;
use std::fs;
use std::os::unix::fs::PermissionsExt;
use std::path::PathBuf;
use std::process::Command;
use tempfile::TempDir;

struct Fixture {
    temp: TempDir,
}

impl Fixture {
    fn new() -> Result<Self> {
        let temp = TempDir::new()?;
        let root = temp.path();
        fs::create_dir_all(root.join("asm1"))?;
        fs::write(root.join("asm1/contigs.fasta"), b">c1\nACGT\n")?;
        fs::create_dir_all(root.join("trim"))?;
        for name in [
            "S1_R1.fastq.gz",
            "S1_R2.fastq.gz",
            "S2_R1.fastq.gz",
            "S2_R2.fastq.gz",
            "S1_u1.fastq.gz",
        ] {
            fs::write(root.join("trim").join(name), b"@r\nACGT\n+\nIIII\n")?;
        }
        fs::create_dir_all(root.join("index"))?;
        fs::write(root.join("index/asm1_bowtie2_index.1.bt2"), b"")?;
        fs::write(root.join("bowtie2.sif"), b"image")?;

        let runtime = root.join("runtime.sh");
        fs::write(
            &runtime,
            "#!/bin/sh\nprintf '%s\\n' \"$@\" > \"$MGWRAP_TEST_ARGS\"\nexit \"${MGWRAP_TEST_EXIT:-0}\"\n",
        )?;
        fs::set_permissions(&runtime, fs::Permissions::from_mode(0o755))?;
        Ok(Self { temp })
    }

    fn path(&self, rel: &str) -> PathBuf {
        self.temp.path().join(rel)
    }

    fn args_file(&self) -> PathBuf {
        self.path("runtime.args")
    }

    fn command(&self, subcommand: &str) -> Command {
        let mut cmd = Command::cargo_bin("mgwrap").unwrap();
        cmd.env("MGWRAP_CONTAINER_RUNTIME", self.path("runtime.sh"))
            .env("MGWRAP_TEST_ARGS", self.args_file())
            .env_remove("MGWRAP_CONDA_HOME")
            .env_remove("MGWRAP_TEST_EXIT")
            .arg(subcommand)
            .arg("--bowtie2_container")
            .arg(self.path("bowtie2.sif"));
        cmd
    }

    fn map_command(&self) -> Command {
        let mut cmd = self.command("bowtie2-map");
        cmd.arg("--bowtie2_index_folder")
            .arg(self.path("index"))
            .arg("--output-dir")
            .arg(self.path("map"))
            .args(["--assembly-name", "asm1", "--metagenome-name", "S1"])
            .args(["--threads", "6"]);
        cmd
    }
}

#[test]
fn index_build_writes_prefix_into_output_dir() -> Result<()> {
    let fx = Fixture::new()?;

    let output = fx
        .command("bowtie2-index")
        .arg("--input-assembly")
        .arg(fx.path("asm1/contigs.fasta"))
        .args(["--output-name", "asm1"])
        .arg("--output-dir")
        .arg(fx.path("built"))
        .output()?;
    assert!(
        output.status.success(),
        "stderr: {}",
        String::from_utf8_lossy(&output.stderr)
    );

    let summary: serde_json::Value = serde_json::from_slice(&output.stdout)?;
    assert_eq!(summary["tool"], "bowtie2-build");
    assert_eq!(summary["jobId"], "asm1");
    assert_eq!(
        summary["outputs"]["indexPrefix"],
        fx.path("built/asm1_bowtie2_index").display().to_string()
    );
    assert!(fx.path("built").is_dir());

    let args = fs::read_to_string(fx.args_file())?;
    let output_root = fs::canonicalize(fx.path("built"))?;
    assert!(args.contains(&format!("{}:/output:rw\n", output_root.display())));
    assert!(args.contains(
        "/opt/conda/etc/profile.d/conda.sh\nbowtie2\nbowtie2-build\n/input/contigs.fasta\n/output/asm1_bowtie2_index\n"
    ));
    Ok(())
}

#[test]
fn index_build_requires_existing_assembly() -> Result<()> {
    let fx = Fixture::new()?;

    fx.command("bowtie2-index")
        .arg("--input-assembly")
        .arg(fx.path("asm1/missing.fasta"))
        .args(["--output-name", "asm1"])
        .arg("--output-dir")
        .arg(fx.path("built"))
        .assert()
        .code(1)
        .stderr(predicate::str::contains("Input file not found"));

    assert!(!fx.args_file().exists());
    Ok(())
}

#[test]
fn mapping_mounts_index_and_joins_libraries() -> Result<()> {
    let fx = Fixture::new()?;

    let output = fx
        .map_command()
        .arg("--r1")
        .arg(fx.path("trim/S1_R1.fastq.gz"))
        .arg(fx.path("trim/S2_R1.fastq.gz"))
        .arg("--r2")
        .arg(fx.path("trim/S1_R2.fastq.gz"))
        .arg(fx.path("trim/S2_R2.fastq.gz"))
        .arg("--single")
        .arg(fx.path("trim/S1_u1.fastq.gz"))
        .output()?;
    assert!(
        output.status.success(),
        "stderr: {}",
        String::from_utf8_lossy(&output.stderr)
    );

    let summary: serde_json::Value = serde_json::from_slice(&output.stdout)?;
    assert_eq!(summary["tool"], "bowtie2");
    assert_eq!(summary["jobId"], "S1");
    assert_eq!(
        summary["outputs"]["sam"],
        fx.path("map/S1_to_asm1_bowtie2.sam").display().to_string()
    );

    let args = fs::read_to_string(fx.args_file())?;
    let index_root = fs::canonicalize(fx.path("index"))?;
    assert!(args.contains(&format!("{}:/index:ro\n", index_root.display())));
    assert!(args.contains("-x\n/index/asm1_bowtie2_index\n"));
    assert!(args.contains("-1\n/input/S1_R1.fastq.gz,/input/S2_R1.fastq.gz\n"));
    assert!(args.contains("-2\n/input/S1_R2.fastq.gz,/input/S2_R2.fastq.gz\n"));
    assert!(args.contains("-U\n/input/S1_u1.fastq.gz\n-p\n6\n-S\n/output/S1_to_asm1_bowtie2.sam\n"));
    assert!(fx.path("map").is_dir());
    Ok(())
}

#[test]
fn mapping_rejects_unequal_pairs() -> Result<()> {
    let fx = Fixture::new()?;

    fx.map_command()
        .arg("--r1")
        .arg(fx.path("trim/S1_R1.fastq.gz"))
        .arg(fx.path("trim/S2_R1.fastq.gz"))
        .arg("--r2")
        .arg(fx.path("trim/S1_R2.fastq.gz"))
        .assert()
        .code(1)
        .stderr(predicate::str::contains("must match the number of R2 files"));

    assert!(!fx.args_file().exists());
    Ok(())
}

#[test]
fn mapping_requires_built_index() -> Result<()> {
    let fx = Fixture::new()?;
    fs::remove_file(fx.path("index/asm1_bowtie2_index.1.bt2"))?;

    fx.map_command()
        .arg("--r1")
        .arg(fx.path("trim/S1_R1.fastq.gz"))
        .arg("--r2")
        .arg(fx.path("trim/S1_R2.fastq.gz"))
        .assert()
        .code(1)
        .stderr(predicate::str::contains("asm1_bowtie2_index.1.bt2"));

    assert!(!fx.args_file().exists());
    Ok(())
}

#[test]
fn mapping_failure_code_is_propagated() -> Result<()> {
    let fx = Fixture::new()?;

    fx.map_command()
        .env("MGWRAP_TEST_EXIT", "2")
        .arg("--r1")
        .arg(fx.path("trim/S1_R1.fastq.gz"))
        .arg("--r2")
        .arg(fx.path("trim/S1_R2.fastq.gz"))
        .assert()
        .code(2)
        .stdout(predicate::str::is_empty())
        .stderr(predicate::str::contains("bowtie2 exited with code 2"));
    Ok(())
}
