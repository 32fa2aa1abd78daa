// Copyright 2018-2021 Dmitry Tantsur <dtantsur@protonmail.com>
//
// Licensed under the Apache License, Version 2.0 (the "License");
// you may not use this file except in compliance with the License.
// You may obtain a copy of the License at
//
//     http://www.apache.org/licenses/LICENSE-2.0
//
// Unless required by applicable law or agreed to in writing, software
// distributed under the License is distributed on an "AS IS" BASIS,
// WITHOUT WARRANTIES OR CONDITIONS OF ANY KIND, either express or implied.
// See the License for the specific language governing permissions and
// limitations under the License.

//! Support for cloud configuration file.

use std::collections::HashMap;
use std::fs::File;
use std::path::{Path, PathBuf};

use log::{debug, warn};
use serde::Deserialize;

use super::cloud::CloudConfig;
use crate::{Config, Error, ErrorKind};

#[derive(Debug, Deserialize)]
struct Root {
    clouds: HashMap<String, CloudConfig>,
}

fn find_config<S: AsRef<str>>(filename: S) -> Option<PathBuf> {
    let filename = filename.as_ref();
    let current = Path::new(filename);
    if current.is_file() {
        match current.canonicalize() {
            Ok(val) => return Some(val),
            Err(e) => warn!("Cannot canonicalize {:?}: {}", current, e),
        }
    }

    if let Some(mut home) = dirs::home_dir() {
        home.push(format!(".config/openstack/{}", filename));
        if home.is_file() {
            return Some(home);
        }
    } else {
        warn!("Cannot find home directory");
    }

    let abs = PathBuf::from(format!("/etc/openstack/{}", filename));
    if abs.is_file() {
        Some(abs)
    } else {
        None
    }
}

fn read_file(path: &Path) -> Result<serde_yaml::Mapping, Error> {
    debug!("Reading cloud configuration from {}", path.display());
    let content = File::open(path).map_err(|e| {
        Error::new(
            ErrorKind::InvalidConfig,
            format!("Cannot read {}: {}", path.display(), e),
        )
    })?;

    match serde_yaml::from_reader(content).map_err(|e| {
        Error::new(
            ErrorKind::InvalidConfig,
            format!("Cannot parse {}: {}", path.display(), e),
        )
    })? {
        serde_yaml::Value::Mapping(mapping) => Ok(mapping),
        other => Err(Error::new(
            ErrorKind::InvalidConfig,
            format!("Root of {} is {:?}, not a mapping", path.display(), other),
        )),
    }
}

/// Merge `src` into `dest`, values from `src` win.
fn merge_mappings(src: serde_yaml::Mapping, dest: &mut serde_yaml::Mapping) {
    for (key, value) in src {
        if let serde_yaml::Value::Mapping(src_mapping) = value {
            if let Some(serde_yaml::Value::Mapping(dest_mapping)) = dest.get_mut(&key) {
                merge_mappings(src_mapping, dest_mapping);
                continue;
            }
            let _ = dest.insert(key, serde_yaml::Value::Mapping(src_mapping));
        } else {
            let _ = dest.insert(key, value);
        }
    }
}

fn from_mappings(
    name: &str,
    mut clouds: serde_yaml::Mapping,
    secure: Option<serde_yaml::Mapping>,
) -> Result<Config, Error> {
    if let Some(secure) = secure {
        merge_mappings(secure, &mut clouds);
    }

    let mut root: Root = serde_yaml::from_value(serde_yaml::Value::Mapping(clouds)).map_err(|e| {
        Error::new(
            ErrorKind::InvalidConfig,
            format!("Cannot parse the cloud configuration: {}", e),
        )
    })?;

    let cloud = root
        .clouds
        .remove(name)
        .ok_or_else(|| Error::new(ErrorKind::InvalidConfig, format!("No such cloud: {}", name)))?;
    cloud.into_config()
}

/// Load the named cloud from `clouds.yaml`.
///
/// The file is searched in the current directory, `~/.config/openstack` and `/etc/openstack`.
/// Secrets from `secure.yaml` in the same locations are merged in.
pub fn from_config<S: AsRef<str>>(cloud_name: S) -> Result<Config, Error> {
    let path = find_config("clouds.yaml").ok_or_else(|| {
        Error::new(
            ErrorKind::InvalidConfig,
            "clouds.yaml was not found in any location",
        )
    })?;
    let secure = match find_config("secure.yaml") {
        Some(path) => Some(read_file(&path)?),
        None => None,
    };
    from_mappings(cloud_name.as_ref(), read_file(&path)?, secure)
}

/// Load the named cloud from an explicit configuration file.
pub fn from_config_file<P: AsRef<Path>, S: AsRef<str>>(
    path: P,
    cloud_name: S,
) -> Result<Config, Error> {
    from_mappings(cloud_name.as_ref(), read_file(path.as_ref())?, None)
}
