// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at http://mozilla.org/MPL/2.0/.

//! Helper functions to handle the KITTI raw dataset.
//!
//! A drive is organized as follows:
//!
//! ```text
//! base/2011_09_26/calib_cam_to_cam.txt
//! base/2011_09_26/2011_09_26_drive_0061_sync/image_00/data/0000000000.png
//! base/2011_09_26/2011_09_26_drive_0061_sync/image_00/timestamps.txt
//! base/2011_09_26/2011_09_26_drive_0061_sync/image_01/data/0000000000.png
//! base/2011_09_26/2011_09_26_drive_0061_sync/oxts/data/0000000000.txt
//! ```

use std::collections::HashMap;
use std::fs;
use std::path::{Path, PathBuf};

use crate::core::camera::Calibration;
use crate::error::{Error, Result};
use crate::misc::interop;
use crate::misc::type_aliases::{GrayMatrix, Mat34, Vec3};

/// Semi-major axis of the WGS-84 ellipsoid (meters).
const WGS84_A: f64 = 6_378_137.0;

/// Flattening of the WGS-84 ellipsoid.
const WGS84_F: f64 = 1.0 / 298.257_223_563;

/// Geodetic coordinates of a GPS fix.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Geodetic {
    /// Latitude in degrees.
    pub lat: f64,
    /// Longitude in degrees.
    pub lon: f64,
    /// Altitude in meters.
    pub alt: f64,
}

/// One synchronized drive of the KITTI raw dataset.
#[derive(Debug, Clone)]
pub struct Drive {
    date_dir: PathBuf,
    drive_dir: PathBuf,
}

impl Drive {
    /// Drive `drive` (for example "0061") recorded on `date` (for example "2011_09_26").
    pub fn new<P: AsRef<Path>>(base: P, date: &str, drive: &str) -> Drive {
        let date_dir = base.as_ref().join(date);
        let drive_dir = date_dir.join(format!("{}_drive_{}_sync", date, drive));
        Drive { date_dir, drive_dir }
    }

    /// Stereo calibration of the gray cameras 0 (left) and 1 (right).
    pub fn calibration(&self, downsample: usize) -> Result<Calibration> {
        let content = fs::read_to_string(self.date_dir.join("calib_cam_to_cam.txt"))?;
        let entries = parse::calibration_file(&content);
        let p_left = projection(&entries, "P_rect_00")?;
        let p_right = projection(&entries, "P_rect_01")?;
        let k = p_right.fixed_view::<3, 3>(0, 0).into_owned();
        Calibration::new(k, p_left, p_right, downsample)
    }

    /// Timestamps (seconds since 1970) of the left images.
    pub fn timestamps(&self) -> Result<Vec<f64>> {
        let content = fs::read_to_string(self.drive_dir.join("image_00").join("timestamps.txt"))?;
        parse::timestamps(&content)
    }

    /// Path of the left image of a frame.
    pub fn left_path(&self, index: usize) -> PathBuf {
        self.data_path("image_00", index, "png")
    }

    /// Path of the right image of a frame.
    pub fn right_path(&self, index: usize) -> PathBuf {
        self.data_path("image_01", index, "png")
    }

    /// Read the left and right gray images of a frame.
    pub fn read_pair(&self, index: usize) -> Result<(GrayMatrix, GrayMatrix)> {
        let left = read_gray(&self.left_path(index), index)?;
        let right = read_gray(&self.right_path(index), index)?;
        Ok((left, right))
    }

    /// GPS fix of a frame.
    pub fn read_fix(&self, index: usize) -> Result<Geodetic> {
        let content = fs::read_to_string(self.data_path("oxts", index, "txt"))?;
        parse::oxts_packet(&content)
    }

    /// Positions (east, north, up) of the first `count` frames,
    /// relative to the first GPS fix.
    pub fn reference_trajectory(&self, count: usize) -> Result<Vec<Vec3>> {
        let fixes = (0..count).map(|i| self.read_fix(i)).collect::<Result<Vec<_>>>()?;
        Ok(match fixes.first() {
            Some(origin) => fixes.iter().map(|fix| geodetic_to_enu(fix, origin)).collect(),
            None => Vec::new(),
        })
    }

    fn data_path(&self, sensor: &str, index: usize, extension: &str) -> PathBuf {
        self.drive_dir
            .join(sensor)
            .join("data")
            .join(format!("{:010}.{}", index, extension))
    }
}

fn read_gray(path: &Path, index: usize) -> Result<GrayMatrix> {
    if !path.is_file() {
        return Err(Error::MissingImage(index));
    }
    let img = image::open(path)?.into_luma8();
    Ok(interop::matrix_from_image(img))
}

fn projection(entries: &HashMap<String, Vec<f64>>, key: &str) -> Result<Mat34> {
    match entries.get(key) {
        Some(values) if values.len() == 12 => Ok(Mat34::from_row_slice(values)),
        Some(values) => Err(Error::Dataset(format!(
            "{} has {} values instead of 12",
            key,
            values.len()
        ))),
        None => Err(Error::Dataset(format!("{} is missing", key))),
    }
}

/// Local East North Up coordinates of a fix relative to an origin fix.
pub fn geodetic_to_enu(fix: &Geodetic, origin: &Geodetic) -> Vec3 {
    let d = ecef(fix) - ecef(origin);
    let (sin_lat, cos_lat) = origin.lat.to_radians().sin_cos();
    let (sin_lon, cos_lon) = origin.lon.to_radians().sin_cos();
    let east = -sin_lon * d.x + cos_lon * d.y;
    let north = -sin_lat * cos_lon * d.x - sin_lat * sin_lon * d.y + cos_lat * d.z;
    let up = cos_lat * cos_lon * d.x + cos_lat * sin_lon * d.y + sin_lat * d.z;
    Vec3::new(east, north, up)
}

/// North East Down coordinates from East North Up coordinates.
pub fn enu_to_ned(enu: &Vec3) -> Vec3 {
    Vec3::new(enu.y, enu.x, -enu.z)
}

/// Earth centered, earth fixed coordinates of a fix.
fn ecef(fix: &Geodetic) -> Vec3 {
    let e2 = WGS84_F * (2.0 - WGS84_F);
    let (sin_lat, cos_lat) = fix.lat.to_radians().sin_cos();
    let (sin_lon, cos_lon) = fix.lon.to_radians().sin_cos();
    let n = WGS84_A / (1.0 - e2 * sin_lat * sin_lat).sqrt();
    Vec3::new(
        (n + fix.alt) * cos_lat * cos_lon,
        (n + fix.alt) * cos_lat * sin_lon,
        (n * (1.0 - e2) + fix.alt) * sin_lat,
    )
}

/// Parse the text files of the dataset.
pub mod parse {
    use super::*;
    use chrono::{NaiveDateTime, TimeZone, Utc};
    use nom::{
        bytes::complete::{tag, take_till1},
        character::complete::{space0, space1},
        combinator::all_consuming,
        multi::separated_list1,
        number::complete::double,
        sequence::terminated,
        IResult,
    };

    /// Parse a calibration file into its `key: values` entries.
    /// Entries whose values are not all numbers, like `calib_time`, are skipped.
    pub fn calibration_file(file_content: &str) -> HashMap<String, Vec<f64>> {
        file_content
            .lines()
            .filter_map(|line| key_values(line).ok())
            .map(|(_, (key, values))| (key.to_string(), values))
            .collect()
    }

    /// Parse a timestamps file, one `YYYY-MM-DD hh:mm:ss.nnnnnnnnn` per line,
    /// into UTC seconds since 1970. Empty lines are ignored.
    pub fn timestamps(file_content: &str) -> Result<Vec<f64>> {
        file_content
            .lines()
            .map(str::trim)
            .filter(|line| !line.is_empty())
            .map(timestamp)
            .collect()
    }

    #[allow(clippy::cast_precision_loss)]
    fn timestamp(line: &str) -> Result<f64> {
        let naive = NaiveDateTime::parse_from_str(line, "%Y-%m-%d %H:%M:%S%.f")
            .map_err(|e| Error::Dataset(format!("invalid timestamp {}: {}", line, e)))?;
        let time = Utc.from_utc_datetime(&naive);
        Ok(time.timestamp() as f64 + f64::from(time.timestamp_subsec_nanos()) * 1e-9)
    }

    /// Parse the latitude, longitude and altitude of an OXTS packet.
    pub fn oxts_packet(file_content: &str) -> Result<Geodetic> {
        let parsed: IResult<&str, Vec<f64>> = separated_list1(space1, double)(file_content.trim());
        match parsed {
            Ok((_, values)) if values.len() >= 3 => Ok(Geodetic {
                lat: values[0],
                lon: values[1],
                alt: values[2],
            }),
            _ => Err(Error::Dataset("invalid oxts packet".to_string())),
        }
    }

    // nom parsers #############################################################

    // Key, colon, and space separated numbers.
    fn key_values(input: &str) -> IResult<&str, (&str, Vec<f64>)> {
        let (input, key) = take_till1(|c| c == ':')(input)?;
        let (input, _) = tag(":")(input)?;
        let (input, _) = space0(input)?;
        let (input, values) =
            all_consuming(terminated(separated_list1(space1, double), space0))(input)?;
        Ok((input, (key.trim(), values)))
    }
} // pub mod parse

// TESTS #############################################################
