mod common;

use std::fs;
use std::path::Path;
use std::process::Command;

use anyhow::Result;
use assert_cmd::prelude::*;
use assert_fs::TempDir;
use predicates::prelude::*;
use rstest::*;

use common::*;

macro_rules! cargo_run {
    ($cmd:expr, $($args:expr),*) => {
        {
            let mut cmd = Command::cargo_bin($cmd)?;
            $(cmd.arg($args);)*
            cmd.assert()
        }
    };
}

/// 在临时目录中准备测试图片：lamp/ 下三张红色系图片，以及若干单独的查询图片
fn dataset(dir: &Path) -> Result<()> {
    let lamp = dir.join("lamp");
    fs::create_dir_all(&lamp)?;
    fs::write(lamp.join("a.png"), solid_png(RED))?;
    fs::write(lamp.join("b.png"), solid_png(DARK_RED))?;
    fs::write(lamp.join("c.PNG"), solid_png(ORANGE))?;
    fs::write(lamp.join("notes.txt"), "not an image")?;
    fs::write(dir.join("tv.png"), solid_png(BLUE))?;
    fs::write(dir.join("query_red.bmp"), solid_bmp(RED))?;
    fs::write(dir.join("query_green.png"), solid_png(GREEN))?;
    Ok(())
}

#[fixture]
fn workspace() -> TempDir {
    let dir = TempDir::new().unwrap();
    dataset(dir.path()).unwrap();
    dir
}

#[rstest]
fn register_and_list(workspace: TempDir) -> Result<()> {
    let conf_dir = workspace.path().join("conf");
    let data = workspace.path();

    cargo_run!("visual-assistant", "-c", &conf_dir, "register", "lamp", data.join("lamp"))
        .success()
        .stdout(predicate::str::contains("lamp\t3"));
    cargo_run!("visual-assistant", "-c", &conf_dir, "register", "tv", data.join("tv.png"))
        .success();

    cargo_run!("visual-assistant", "-c", &conf_dir, "list")
        .success()
        .stdout(predicate::eq("lamp\t3\ntv\t1\n"));
    cargo_run!("visual-assistant", "-c", &conf_dir, "list", "--output-format", "json")
        .success()
        .stdout(predicate::str::contains(r#""image_count": 3"#));

    cargo_run!("visual-assistant", "-c", &conf_dir, "show", "lamp")
        .success()
        .stdout(predicate::str::contains("image_2.png"));

    Ok(())
}

#[rstest]
fn register_duplicate_fails(workspace: TempDir) -> Result<()> {
    let conf_dir = workspace.path().join("conf");
    let tv = workspace.path().join("tv.png");

    cargo_run!("visual-assistant", "-c", &conf_dir, "register", "tv", &tv).success();
    cargo_run!("visual-assistant", "-c", &conf_dir, "register", "tv", &tv)
        .failure()
        .stderr(predicate::str::contains("tv"));

    Ok(())
}

#[rstest]
fn recognize(workspace: TempDir) -> Result<()> {
    let conf_dir = workspace.path().join("conf");
    let data = workspace.path();

    cargo_run!("visual-assistant", "-c", &conf_dir, "register", "lamp", data.join("lamp")).success();
    cargo_run!("visual-assistant", "-c", &conf_dir, "register", "tv", data.join("tv.png")).success();

    cargo_run!("visual-assistant", "-c", &conf_dir, "recognize", data.join("query_red.bmp"))
        .success()
        .stdout(predicate::eq("1.00\tlamp\n"));
    cargo_run!("visual-assistant", "-c", &conf_dir, "recognize", data.join("query_green.png"))
        .success()
        .stdout(predicate::eq("0.33\t-\n"));
    cargo_run!("visual-assistant", "-c", &conf_dir, "recognize", data.join("query_red.bmp"), "--all")
        .success()
        .stdout(predicate::eq("1.00\tlamp\n0.33\ttv\n"));

    cargo_run!(
        "visual-assistant",
        "-c",
        &conf_dir,
        "recognize",
        data.join("query_red.bmp"),
        "-d",
        "LAMP",
        "-a",
        "on"
    )
    .success()
    .stdout(predicate::str::contains("Debug: Would turn lamp on"));

    cargo_run!(
        "visual-assistant",
        "-c",
        &conf_dir,
        "recognize",
        data.join("query_red.bmp"),
        "-d",
        "tv",
        "-a",
        "on"
    )
    .failure()
    .stdout(predicate::str::contains("Recognized 'lamp' but requested 'tv'"));

    Ok(())
}

#[rstest]
fn manage_device(workspace: TempDir) -> Result<()> {
    let conf_dir = workspace.path().join("conf");
    let data = workspace.path();

    cargo_run!("visual-assistant", "-c", &conf_dir, "register", "lamp", data.join("lamp")).success();
    cargo_run!("visual-assistant", "-c", &conf_dir, "add", "lamp", data.join("tv.png"))
        .success()
        .stdout(predicate::str::contains("lamp\t4"));
    cargo_run!("visual-assistant", "-c", &conf_dir, "remove-image", "lamp", "image_0.png")
        .success()
        .stdout(predicate::str::contains("lamp\t3"));
    cargo_run!("visual-assistant", "-c", &conf_dir, "remove-image", "lamp", "image_0.png").failure();
    cargo_run!("visual-assistant", "-c", &conf_dir, "rename", "lamp", "desk lamp").success();
    cargo_run!("visual-assistant", "-c", &conf_dir, "reindex").success();
    cargo_run!("visual-assistant", "-c", &conf_dir, "list")
        .success()
        .stdout(predicate::eq("desk lamp\t3\n"));
    cargo_run!("visual-assistant", "-c", &conf_dir, "delete", "desk lamp").success();
    cargo_run!("visual-assistant", "-c", &conf_dir, "list").success().stdout(predicate::eq(""));
    cargo_run!("visual-assistant", "-c", &conf_dir, "delete", "desk lamp").failure();

    assert!(!conf_dir.join("device_photos").join("desk lamp").exists());
    Ok(())
}
