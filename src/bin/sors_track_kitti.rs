// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at http://mozilla.org/MPL/2.0/.

use std::{env, error::Error};

use stereo_odometry_rs::core::{odometry, trajectory::Trajectory};
use stereo_odometry_rs::dataset::kitti::Drive;
use stereo_odometry_rs::misc::type_aliases::{Float, Vec3};

fn main() {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();
    let args: Vec<String> = env::args().collect();
    if let Err(error) = my_run(&args) {
        eprintln!("{:?}", error);
    }
}

const USAGE: &str = "Usage: ./sors_track_kitti base_dir date drive [max_frames [downsample]]";

fn my_run(args: &[String]) -> Result<(), Box<dyn Error>> {
    // Check that the arguments are correct.
    let valid_args = check_args(args)?;

    let drive = Drive::new(&valid_args.base_dir, &valid_args.date, &valid_args.drive);
    let calibration = drive.calibration(valid_args.downsample)?;
    let mut timestamps = drive.timestamps()?;
    if let Some(max) = valid_args.max_frames {
        timestamps.truncate(max);
    }
    if timestamps.is_empty() {
        return Err("no frame to track".into());
    }

    // Ground truth is optional, only used for the diagnostic trajectory.
    let reference = match drive.reference_trajectory(timestamps.len()) {
        Ok(reference) => Some(reference),
        Err(error) => {
            log::warn!("no reference trajectory: {}", error);
            None
        }
    };
    let mut reference_scaled = Trajectory::default();

    // Setup tracking configuration.
    let config = odometry::Config {
        downsample: valid_args.downsample,
        ..odometry::Config::default()
    };

    // Initialize tracker with the first stereo pair.
    let (left, right) = drive.read_pair(0)?;
    let mut tracker = config.init(calibration, timestamps[0], left, right)?;
    print_line(timestamps[0], tracker.trajectory());

    // Track every following pair.
    for (index, &timestamp) in timestamps.iter().enumerate().skip(1) {
        let (left, right) = drive.read_pair(index)?;
        let report = tracker.track(timestamp, left, right)?;
        print_line(timestamp, tracker.trajectory());

        if let Some(reference) = &reference {
            let gt_step = (reference[index] - reference[index - 1]).norm();
            let t_norm = report.motion.translation.norm();
            let scale = if t_norm > 0.0 { gt_step / t_norm } else { 0.0 };
            reference_scaled.update(
                &report.motion.rotation,
                &report.motion.translation,
                report.dt,
                scale,
                true,
            )?;
        }
    }

    if let Some(reference) = &reference {
        log_distance("odometry", tracker.trajectory(), reference);
        log_distance("reference scaled", &reference_scaled, reference);
    }
    Ok(())
}

struct Args {
    base_dir: String,
    date: String,
    drive: String,
    max_frames: Option<usize>,
    downsample: usize,
}

/// Verify that command line arguments are correct.
fn check_args(args: &[String]) -> Result<Args, String> {
    eprintln!("{:?}", args);
    let (base_dir, date, drive, rest) = match args {
        [_, base_dir, date, drive, rest @ ..] if rest.len() <= 2 => (base_dir, date, drive, rest),
        _ => {
            eprintln!("{}", USAGE);
            return Err(format!("Wrong number of arguments: {}", args.len()));
        }
    };
    let max_frames = match rest.get(0) {
        Some(s) => Some(s.parse().map_err(|_| format!("Invalid max_frames: {}", s))?),
        None => None,
    };
    let downsample = match rest.get(1) {
        Some(s) => s.parse().map_err(|_| format!("Invalid downsample: {}", s))?,
        None => 1,
    };
    Ok(Args {
        base_dir: base_dir.clone(),
        date: date.clone(),
        drive: drive.clone(),
        max_frames,
        downsample,
    })
}

/// Print "timestamp x y z speed" for the last position of the trajectory.
fn print_line(timestamp: f64, trajectory: &Trajectory) {
    let position = trajectory.positions().last().cloned().unwrap_or_else(Vec3::zeros);
    let speed = trajectory.velocities().last().map_or(0.0, |v| v.norm());
    println!(
        "{} {} {} {} {}",
        timestamp, position.x, position.y, position.z, speed
    );
}

/// Log the horizontal distance from the start of both trajectories.
fn log_distance(name: &str, trajectory: &Trajectory, reference: &[Vec3]) {
    let (end, gt_end) = match (trajectory.positions().last(), reference.last()) {
        (Some(end), Some(gt_end)) => (end, gt_end),
        _ => return,
    };
    // Camera frame is x right, z forward. Reference is east, north.
    let horizontal: Float = (end.x.powi(2) + end.z.powi(2)).sqrt();
    let gt_horizontal: Float = (gt_end.x.powi(2) + gt_end.y.powi(2)).sqrt();
    log::info!(
        "{}: travelled {:.2}, reference {:.2}",
        name,
        horizontal,
        gt_horizontal
    );
}
