use std::fs;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use log::debug;
use regex::Regex;
use walkdir::WalkDir;

/// 默认扫描的图片后缀名
pub const DEFAULT_SUFFIX: &str = "jpg,jpeg,png,gif,webp";

/// 将逗号分隔的后缀名列表转换为不区分大小写的正则表达式
pub fn suffix_regex(suffix: &str) -> Result<Regex> {
    let pattern = format!("(?i)^({})$", suffix.replace(',', "|"));
    Regex::new(&pattern).with_context(|| format!("无效的后缀名: {}", suffix))
}

/// 收集图片路径
///
/// 直接指定的文件总是被收集，目录会被递归扫描，只保留后缀名匹配的文件。
/// 同一目录下的文件按文件名排序，保证图片序号稳定。
pub fn collect_images<P: AsRef<Path>>(paths: &[P], suffix: &str) -> Result<Vec<PathBuf>> {
    let re = suffix_regex(suffix)?;
    let mut images = vec![];
    for path in paths {
        let path = path.as_ref();
        if path.is_file() {
            images.push(path.to_path_buf());
            continue;
        }
        for entry in WalkDir::new(path).sort_by_file_name() {
            let entry = entry?;
            let path = entry.path();
            let matched = path
                .extension()
                .map(|ext| re.is_match(&ext.to_string_lossy()))
                .unwrap_or(false);
            if entry.file_type().is_file() && matched {
                images.push(path.to_path_buf());
            }
        }
    }
    debug!("收集到 {} 张图片", images.len());
    Ok(images)
}

/// 读取所有图片的原始内容
pub fn read_images(paths: &[PathBuf]) -> Result<Vec<Vec<u8>>> {
    paths
        .iter()
        .map(|path| fs::read(path).with_context(|| format!("无法读取图片: {}", path.display())))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_suffix_regex() {
        let re = suffix_regex("jpg,png").unwrap();
        assert!(re.is_match("jpg"));
        assert!(re.is_match("PNG"));
        assert!(!re.is_match("jpeg"));
        assert!(!re.is_match("xjpg"));
    }

    #[test]
    fn test_collect_images() -> Result<()> {
        let dir = tempfile::tempdir()?;
        let nested = dir.path().join("nested");
        fs::create_dir(&nested)?;
        fs::write(dir.path().join("b.jpg"), b"")?;
        fs::write(dir.path().join("a.PNG"), b"")?;
        fs::write(dir.path().join("notes.txt"), b"")?;
        fs::write(nested.join("c.webp"), b"")?;
        let explicit = dir.path().join("notes.txt");

        let images = collect_images(&[dir.path().to_path_buf()], DEFAULT_SUFFIX)?;
        let names: Vec<_> = images
            .iter()
            .map(|p| p.file_name().unwrap().to_string_lossy().into_owned())
            .collect();
        assert_eq!(names, ["a.PNG", "b.jpg", "c.webp"]);

        let images = collect_images(&[explicit.clone()], DEFAULT_SUFFIX)?;
        assert_eq!(images, [explicit]);
        Ok(())
    }

    #[test]
    fn test_read_images_missing() {
        assert!(read_images(&[PathBuf::from("/nonexistent/image.jpg")]).is_err());
    }
}
