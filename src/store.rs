use std::collections::BTreeMap;
use std::fs::{self, File};
use std::io::{self, Write};
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError, RwLock};

use image::ImageFormat;
use log::{debug, info, warn};
use rayon::prelude::*;
use serde::de::IgnoredAny;
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

use crate::config::ConfDir;
use crate::error::{DeviceError, Result};
use crate::feature::{Descriptor, EXTRACTOR_VERSION, FeatureExtractor};

/// 设备名到设备记录的映射，遍历顺序即设备名的字典序
pub type Devices = BTreeMap<String, DeviceRecord>;

/// 设备记录
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DeviceRecord {
    /// 设备名称，设备库中的唯一主键，区分大小写
    pub name: String,
    /// 每张训练图片对应一个描述符，顺序与图片序号一致
    pub descriptors: Vec<Descriptor>,
    /// 始终等于 `descriptors.len()`
    pub image_count: usize,
}

impl DeviceRecord {
    fn new(name: &str, descriptors: Vec<Descriptor>) -> Self {
        Self { name: name.to_owned(), image_count: descriptors.len(), descriptors }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
pub struct DeviceSummary {
    pub name: String,
    pub image_count: usize,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
pub struct DeviceDetails {
    pub name: String,
    pub image_count: usize,
    /// 图片文件名，按序号升序排列
    pub images: Vec<String>,
}

#[derive(Deserialize)]
struct StoreHeader {
    extractor: String,
    devices: BTreeMap<String, IgnoredAny>,
}

#[derive(Deserialize)]
struct StoreFile {
    devices: Devices,
}

#[derive(Serialize)]
struct StoreFileRef<'a> {
    extractor: &'a str,
    devices: &'a Devices,
}

pub struct DeviceStoreBuilder {
    conf_dir: ConfDir,
    reindex: bool,
}

impl DeviceStoreBuilder {
    pub fn new(conf_dir: ConfDir) -> Self {
        Self { conf_dir, reindex: false }
    }

    /// 设备库由其他版本的特征提取器生成时，是否使用已保存的图片重新计算特征，而不是报错
    pub fn reindex(mut self, reindex: bool) -> Self {
        self.reindex = reindex;
        self
    }

    pub fn open(self) -> Result<DeviceStore> {
        fs::create_dir_all(self.conf_dir.photos())?;

        let store = DeviceStore {
            conf_dir: self.conf_dir,
            extractor: FeatureExtractor,
            devices: RwLock::new(Arc::default()),
            write_lock: Mutex::new(()),
        };

        let path = store.conf_dir.devices();
        if !path.exists() {
            info!("设备库不存在，使用空设备库: {}", path.display());
            return Ok(store);
        }

        info!("加载设备库: {}", path.display());
        let data = fs::read(&path)?;
        let header: StoreHeader = serde_json::from_slice(&data).map_err(io::Error::from)?;

        if header.extractor != EXTRACTOR_VERSION {
            if !self.reindex {
                return Err(DeviceError::ExtractorMismatch {
                    found: header.extractor,
                    expected: EXTRACTOR_VERSION.to_owned(),
                });
            }
            warn!("设备库的特征提取器版本为 {}，正在重新计算特征", header.extractor);
            let devices = header
                .devices
                .into_keys()
                .map(|name| {
                    let record = DeviceRecord::new(&name, vec![]);
                    (name, record)
                })
                .collect();
            store.swap(devices);
            store.reindex()?;
            return Ok(store);
        }

        let file: StoreFile = serde_json::from_slice(&data).map_err(io::Error::from)?;
        let mut devices = file.devices;
        for (name, record) in devices.iter_mut() {
            if record.image_count != record.descriptors.len() {
                warn!(
                    "设备 {} 的图片数量 {} 与描述符数量 {} 不一致，已修正",
                    name,
                    record.image_count,
                    record.descriptors.len()
                );
                record.image_count = record.descriptors.len();
            }
        }
        debug!("已加载 {} 个设备", devices.len());
        store.swap(devices);

        Ok(store)
    }
}

/// 设备库
///
/// 整个设备库保存在内存中，每次修改都会先写入磁盘，成功后才替换内存中的快照。
/// 所有修改操作由同一把锁串行化，读操作只会看到修改之前或之后的完整快照。
pub struct DeviceStore {
    conf_dir: ConfDir,
    extractor: FeatureExtractor,
    devices: RwLock<Arc<Devices>>,
    write_lock: Mutex<()>,
}

impl DeviceStore {
    pub fn conf_dir(&self) -> &ConfDir {
        &self.conf_dir
    }

    /// 返回当前设备库的只读快照
    pub fn snapshot(&self) -> Arc<Devices> {
        self.devices.read().unwrap_or_else(PoisonError::into_inner).clone()
    }

    /// 注册一个新设备
    ///
    /// 所有图片在写入磁盘之前完成解码和特征计算，任何一张图片无法解码时不会留下任何文件
    pub fn register<B>(&self, name: &str, images: &[B]) -> Result<DeviceRecord>
    where
        B: AsRef<[u8]> + Sync,
    {
        validate_name(name)?;
        let _guard = self.lock();
        let current = self.snapshot();
        if dir_owner(&current, name).is_some() {
            return Err(DeviceError::DuplicateDevice(name.to_owned()));
        }
        if images.is_empty() {
            return Err(DeviceError::EmptyImageSet);
        }

        let descriptors = self.extractor.extract_batch(images)?;

        // 没有任何设备占用这个目录，存在的话只能是残留
        let dir = self.conf_dir.device_dir(name);
        if dir.exists() {
            warn!("清理残留的设备目录: {}", dir.display());
            fs::remove_dir_all(&dir)?;
        }
        fs::create_dir_all(&dir)?;
        if let Err(e) = write_images(&dir, 0, images) {
            remove_quietly(&dir);
            return Err(e);
        }

        let record = DeviceRecord::new(name, descriptors);
        let mut devices = Devices::clone(&current);
        devices.insert(name.to_owned(), record.clone());
        if let Err(e) = self.commit(devices) {
            remove_quietly(&dir);
            return Err(e);
        }

        info!("注册设备 {}，共 {} 张图片", name, record.image_count);
        Ok(record)
    }

    /// 为已有设备追加图片，新图片的序号接在现有最大序号之后
    pub fn add_images<B>(&self, name: &str, images: &[B]) -> Result<DeviceRecord>
    where
        B: AsRef<[u8]> + Sync,
    {
        let _guard = self.lock();
        let current = self.snapshot();
        let record = current
            .get(name)
            .ok_or_else(|| DeviceError::UnknownDevice(name.to_owned()))?;
        if images.is_empty() {
            return Err(DeviceError::EmptyImageSet);
        }

        let new_descriptors = self.extractor.extract_batch(images)?;

        let dir = self.conf_dir.device_dir(name);
        fs::create_dir_all(&dir)?;
        let next = list_images(&dir)?.last().map_or(0, |(index, _)| index + 1);
        let written = write_images(&dir, next, images)?;

        let mut record = record.clone();
        record.descriptors.extend(new_descriptors);
        record.image_count = record.descriptors.len();

        let mut devices = Devices::clone(&current);
        devices.insert(name.to_owned(), record.clone());
        if let Err(e) = self.commit(devices) {
            written.iter().for_each(|path| remove_quietly(path));
            return Err(e);
        }

        info!("设备 {} 新增 {} 张图片，共 {} 张", name, written.len(), record.image_count);
        Ok(record)
    }

    /// 删除设备的一张图片，然后用剩余图片重新计算该设备的全部描述符
    pub fn delete_image(&self, name: &str, image: &str) -> Result<DeviceRecord> {
        let _guard = self.lock();
        let current = self.snapshot();
        if !current.contains_key(name) {
            return Err(DeviceError::UnknownDevice(name.to_owned()));
        }

        let dir = self.conf_dir.device_dir(name);
        let path = self.existing_image(name, image)?;

        let backup = fs::read(&path)?;
        fs::remove_file(&path)?;

        let record = match self.recompute(&dir) {
            Ok(descriptors) => DeviceRecord::new(name, descriptors),
            Err(e) => {
                restore_file(&path, &backup);
                return Err(e);
            }
        };

        let mut devices = Devices::clone(&current);
        devices.insert(name.to_owned(), record.clone());
        if let Err(e) = self.commit(devices) {
            restore_file(&path, &backup);
            return Err(e);
        }

        info!("删除设备 {} 的图片 {}，剩余 {} 张", name, image, record.image_count);
        Ok(record)
    }

    /// 重命名设备，同时移动图片目录；新旧名称相同时什么也不做
    pub fn rename(&self, old: &str, new: &str) -> Result<()> {
        let _guard = self.lock();
        let current = self.snapshot();
        let record = current
            .get(old)
            .ok_or_else(|| DeviceError::UnknownDevice(old.to_owned()))?;
        validate_name(new)?;
        if old == new {
            return Ok(());
        }
        let owner = dir_owner(&current, new);
        if owner.is_some_and(|owner| owner != old) {
            return Err(DeviceError::DuplicateDevice(new.to_owned()));
        }
        // 只改变大小写时，在大小写不敏感的文件系统上新旧目录是同一个
        let same_dir = owner.is_some();

        let old_dir = self.conf_dir.device_dir(old);
        let new_dir = self.conf_dir.device_dir(new);
        let moved = old_dir.exists();
        if moved {
            if !same_dir && new_dir.exists() {
                warn!("清理残留的设备目录: {}", new_dir.display());
                fs::remove_dir_all(&new_dir)?;
            }
            fs::rename(&old_dir, &new_dir)?;
        }

        let mut record = record.clone();
        record.name = new.to_owned();
        let mut devices = Devices::clone(&current);
        devices.remove(old);
        devices.insert(new.to_owned(), record);
        if let Err(e) = self.commit(devices) {
            if moved {
                rename_quietly(&new_dir, &old_dir);
            }
            return Err(e);
        }

        info!("设备 {} 重命名为 {}", old, new);
        Ok(())
    }

    /// 删除设备及其全部图片，不可恢复
    pub fn delete(&self, name: &str) -> Result<()> {
        let _guard = self.lock();
        let current = self.snapshot();
        if !current.contains_key(name) {
            return Err(DeviceError::UnknownDevice(name.to_owned()));
        }

        let dir = self.conf_dir.device_dir(name);
        let trash = self.conf_dir.trash_dir(name);
        let moved = dir.exists();
        if moved {
            if trash.exists() {
                fs::remove_dir_all(&trash)?;
            }
            fs::rename(&dir, &trash)?;
        }

        let mut devices = Devices::clone(&current);
        devices.remove(name);
        if let Err(e) = self.commit(devices) {
            if moved {
                rename_quietly(&trash, &dir);
            }
            return Err(e);
        }
        if moved {
            remove_quietly(&trash);
        }

        info!("删除设备 {}", name);
        Ok(())
    }

    pub fn list(&self) -> Vec<DeviceSummary> {
        self.snapshot()
            .iter()
            .map(|(name, record)| DeviceSummary { name: name.clone(), image_count: record.image_count })
            .collect()
    }

    pub fn get(&self, name: &str) -> Result<DeviceDetails> {
        // 持有写锁，避免读取图片目录时与重命名或删除交错
        let _guard = self.lock();
        let current = self.snapshot();
        let record = current
            .get(name)
            .ok_or_else(|| DeviceError::UnknownDevice(name.to_owned()))?;
        let images = list_images(&self.conf_dir.device_dir(name))?
            .into_iter()
            .map(|(_, file)| file)
            .collect();
        Ok(DeviceDetails { name: name.to_owned(), image_count: record.image_count, images })
    }

    /// 返回设备某张图片的文件路径
    pub fn image_path(&self, name: &str, image: &str) -> Result<PathBuf> {
        if !self.snapshot().contains_key(name) {
            return Err(DeviceError::UnknownDevice(name.to_owned()));
        }
        self.existing_image(name, image)
    }

    /// 使用已保存的图片重新计算所有设备的描述符，返回处理的设备数量
    pub fn reindex(&self) -> Result<usize> {
        let _guard = self.lock();
        let current = self.snapshot();
        let mut devices = Devices::new();
        for name in current.keys() {
            let descriptors = self.recompute(&self.conf_dir.device_dir(name))?;
            debug!("设备 {} 重新计算了 {} 个描述符", name, descriptors.len());
            devices.insert(name.clone(), DeviceRecord::new(name, descriptors));
        }
        let count = devices.len();
        self.commit(devices)?;
        info!("已重新计算 {} 个设备的特征", count);
        Ok(count)
    }

    fn lock(&self) -> MutexGuard<'_, ()> {
        self.write_lock.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn swap(&self, devices: Devices) {
        *self.devices.write().unwrap_or_else(PoisonError::into_inner) = Arc::new(devices);
    }

    /// 先持久化，成功后再替换内存快照
    fn commit(&self, devices: Devices) -> Result<()> {
        self.persist(&devices)?;
        self.swap(devices);
        Ok(())
    }

    fn persist(&self, devices: &Devices) -> Result<()> {
        let tmp = self.conf_dir.devices_tmp();
        let data = serde_json::to_vec_pretty(&StoreFileRef { extractor: EXTRACTOR_VERSION, devices })
            .map_err(io::Error::from)?;
        let mut file = File::create(&tmp)?;
        file.write_all(&data)?;
        file.sync_all()?;
        fs::rename(&tmp, self.conf_dir.devices())?;
        Ok(())
    }

    fn existing_image(&self, name: &str, image: &str) -> Result<PathBuf> {
        let unknown = || DeviceError::UnknownImage { device: name.to_owned(), image: image.to_owned() };
        image_index(image).ok_or_else(unknown)?;
        let path = self.conf_dir.device_dir(name).join(image);
        if !path.is_file() {
            return Err(unknown());
        }
        Ok(path)
    }

    /// 按图片序号依次计算描述符，无法解码的图片会被跳过
    fn recompute(&self, dir: &Path) -> Result<Vec<Descriptor>> {
        let images = list_images(dir)?;
        let descriptors = images
            .par_iter()
            .map(|(_, file)| -> Result<Option<Descriptor>> {
                let bytes = fs::read(dir.join(file))?;
                match self.extractor.extract_bytes(&bytes) {
                    Ok(descriptor) => Ok(Some(descriptor)),
                    Err(e) => {
                        warn!("跳过无法解码的图片 {}: {}", file, e);
                        Ok(None)
                    }
                }
            })
            .collect::<Result<Vec<_>>>()?;
        Ok(descriptors.into_iter().flatten().collect())
    }
}

/// 检查设备名称能否安全地作为目录名
pub fn validate_name(name: &str) -> Result<()> {
    let invalid =
        name.trim().is_empty() || name.starts_with('.') || name.contains(['/', '\\', '\0']);
    if invalid {
        return Err(DeviceError::InvalidDeviceName(name.to_owned()));
    }
    Ok(())
}

/// 返回图片目录与 `name` 相同的设备名
///
/// 设备名区分大小写，但图片目录可能位于大小写不敏感的文件系统上，所以按忽略大小写比较
fn dir_owner<'a>(devices: &'a Devices, name: &str) -> Option<&'a str> {
    let folded = name.to_lowercase();
    devices.keys().map(String::as_str).find(|key| key.to_lowercase() == folded)
}

/// 解析 `image_<序号>.<扩展名>` 格式的图片文件名
fn image_index(file_name: &str) -> Option<u64> {
    let (stem, ext) = file_name.rsplit_once('.')?;
    ImageFormat::from_extension(ext)?;
    let index = stem.strip_prefix("image_")?;
    if index.is_empty() || !index.bytes().all(|b| b.is_ascii_digit()) {
        return None;
    }
    index.parse().ok()
}

/// 返回目录中的图片，按序号升序排列
fn list_images(dir: &Path) -> Result<Vec<(u64, String)>> {
    if !dir.exists() {
        return Ok(vec![]);
    }
    let mut images = vec![];
    for entry in fs::read_dir(dir)? {
        let entry = entry?;
        if !entry.file_type()?.is_file() {
            continue;
        }
        let Ok(file) = entry.file_name().into_string() else {
            continue;
        };
        if let Some(index) = image_index(&file) {
            images.push((index, file));
        }
    }
    images.sort();
    Ok(images)
}

fn write_images<B: AsRef<[u8]>>(dir: &Path, start: u64, images: &[B]) -> Result<Vec<PathBuf>> {
    let mut written = Vec::with_capacity(images.len());
    for (i, bytes) in images.iter().enumerate() {
        let bytes = bytes.as_ref();
        let result = image::guess_format(bytes)
            .map_err(DeviceError::from)
            .and_then(|format| {
                let ext = format.extensions_str().first().copied().unwrap_or("img");
                let path = dir.join(format!("image_{}.{}", start + i as u64, ext));
                fs::write(&path, bytes)?;
                Ok(path)
            });
        match result {
            Ok(path) => written.push(path),
            Err(e) => {
                written.iter().for_each(|path| remove_quietly(path));
                return Err(e);
            }
        }
    }
    Ok(written)
}

fn remove_quietly(path: &Path) {
    let result = if path.is_dir() { fs::remove_dir_all(path) } else { fs::remove_file(path) };
    if let Err(e) = result {
        warn!("无法删除 {}: {}", path.display(), e);
    }
}

fn rename_quietly(from: &Path, to: &Path) {
    if let Err(e) = fs::rename(from, to) {
        warn!("无法将 {} 移动回 {}: {}", from.display(), to.display(), e);
    }
}

fn restore_file(path: &Path, data: &[u8]) {
    if let Err(e) = fs::write(path, data) {
        warn!("无法恢复图片 {}: {}", path.display(), e);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_validate_name() {
        assert!(validate_name("lamp").is_ok());
        assert!(validate_name("Living Room Light").is_ok());
        assert!(validate_name("").is_err());
        assert!(validate_name("   ").is_err());
        assert!(validate_name(".hidden").is_err());
        assert!(validate_name("..").is_err());
        assert!(validate_name("a/b").is_err());
        assert!(validate_name("a\\b").is_err());
    }

    #[test]
    fn test_dir_owner() {
        let mut devices = Devices::new();
        devices.insert("Desk Lamp".into(), DeviceRecord::new("Desk Lamp", vec![]));
        assert_eq!(dir_owner(&devices, "desk lamp"), Some("Desk Lamp"));
        assert_eq!(dir_owner(&devices, "Desk Lamp"), Some("Desk Lamp"));
        assert_eq!(dir_owner(&devices, "lamp"), None);
    }

    #[test]
    fn test_image_index() {
        assert_eq!(image_index("image_0.jpg"), Some(0));
        assert_eq!(image_index("image_12.png"), Some(12));
        assert_eq!(image_index("image_3.JPEG"), Some(3));
        assert_eq!(image_index("image_.png"), None);
        assert_eq!(image_index("image_+1.png"), None);
        assert_eq!(image_index("photo_1.png"), None);
        assert_eq!(image_index("image_1.txt"), None);
        assert_eq!(image_index("image_1"), None);
        assert_eq!(image_index("../image_1.png"), None);
    }

    #[test]
    fn test_list_images_sorted_numerically() {
        let dir = tempfile::TempDir::new().unwrap();
        for file in ["image_10.png", "image_2.jpg", "image_0.png", "notes.txt"] {
            fs::write(dir.path().join(file), b"x").unwrap();
        }
        let images = list_images(dir.path()).unwrap();
        let files: Vec<_> = images.iter().map(|(_, f)| f.as_str()).collect();
        assert_eq!(files, ["image_0.png", "image_2.jpg", "image_10.png"]);
    }

    #[test]
    fn test_list_images_missing_dir() {
        assert!(list_images(Path::new("/nonexistent/visual-assistant")).unwrap().is_empty());
    }
}
