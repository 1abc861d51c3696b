// ilbm-cycle - decode IFF images and animate their color cycles
// Copyright (C) 2025  Mathias Panzenböck
// 
// This program is free software: you can redistribute it and/or modify
// it under the terms of the GNU General Public License as published by
// the Free Software Foundation, either version 3 of the License, or
// (at your option) any later version.
// 
// This program is distributed in the hope that it will be useful,
// but WITHOUT ANY WARRANTY; without even the implied warranty of
// MERCHANTABILITY or FITNESS FOR A PARTICULAR PURPOSE.  See the
// GNU General Public License for more details.
// 
// You should have received a copy of the GNU General Public License
// along with this program.  If not, see <https://www.gnu.org/licenses/>.

use std::{fs::File, io::{BufReader, Write}, path::{Path, PathBuf}, process::ExitCode};

use anyhow::Context;
use clap::{ArgAction, Parser, Subcommand};
use ilbm_cycle::{
    animate,
    iff::{parse_iff, ChunkId, ParseRules},
    ticks_per_frame,
    ColorRange,
    Image,
};

#[derive(Parser, Debug)]
#[command(version, about = "Inspect IFF ILBM/PBM images and their color cycles.")]
struct Args {
    /// More log output, repeat for even more
    #[arg(short, long, action = ArgAction::Count, global = true)]
    verbose: u8,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Print header, palette and color ranges of an image
    Info {
        path: PathBuf,

        /// Print as JSON
        #[arg(long)]
        json: bool,
    },

    /// List the chunks of an ILBM or PBM file
    Chunks {
        path: PathBuf,
    },

    /// Print the cycled color table for one or more frames
    Frame {
        path: PathBuf,

        /// Elapsed time of the first frame in 16.16 fixed point ticks
        #[arg(long, default_value_t = 0)]
        ticks: u32,

        /// Blend between neighbouring colors
        #[arg(long)]
        blend: bool,

        /// Slow down by this factor, one frame advances 65536 / SPEED ticks
        #[arg(long, default_value_t = 1, value_parser = clap::value_parser!(u32).range(1..))]
        speed: u32,

        /// Number of frames to print
        #[arg(long, default_value_t = 1)]
        frames: u32,

        /// JSON file with color ranges that replace the ones of the image
        #[arg(long)]
        ranges: Option<PathBuf>,

        /// Print as JSON
        #[arg(long)]
        json: bool,
    },
}

#[derive(Debug, Default)]
struct ChunkList {
    form_type: Option<ChunkId>,
    chunks: Vec<(ChunkId, usize)>,
}

fn list_ilbm(state: &mut ChunkList, _data: &[u8]) -> ilbm_cycle::Result<()> {
    state.form_type = Some(ChunkId::ILBM);
    Ok(())
}

fn list_pbm(state: &mut ChunkList, _data: &[u8]) -> ilbm_cycle::Result<()> {
    state.form_type = Some(ChunkId::PBM);
    Ok(())
}

fn list_chunk(state: &mut ChunkList, id: ChunkId, data: &[u8]) -> ilbm_cycle::Result<()> {
    state.chunks.push((id, data.len()));
    Ok(())
}

fn load(path: &Path) -> anyhow::Result<Image> {
    let image = ilbm_cycle::decode_with_sink(path, |message| log::debug!("{}: {message}", path.display()))
        .with_context(|| format!("failed to decode {}", path.display()))?;
    Ok(image)
}

fn print_info(path: &Path, json: bool) -> anyhow::Result<()> {
    let image = load(path)?;
    let mut stdout = std::io::stdout().lock();

    if json {
        serde_json::to_writer_pretty(&mut stdout, &image.info())?;
        writeln!(stdout)?;
        return Ok(());
    }

    let header = image.header();
    writeln!(stdout, "{}: {:?}, {}x{} pixels, {} bit-planes, compression {:?}, masking {:?}",
        path.display(), image.pixel_format(), image.width(), image.height(), image.depth(),
        header.compression(), header.masking())?;
    writeln!(stdout, "origin {},{}, page {}x{}, aspect {}:{}, transparent color {}",
        header.x_origin(), header.y_origin(), header.page_width(), header.page_height(),
        header.x_aspect(), header.y_aspect(), header.trans_color())?;
    writeln!(stdout, "palette ({} colors): {}", image.palette().len(), image.palette())?;

    for (index, range) in image.color_ranges().iter().enumerate() {
        writeln!(stdout, "color range {index}: {}..={}, rate {}{}",
            range.low(), range.high(), range.rate(),
            if range.reverse() { ", reverse" } else { "" })?;
    }

    if !image.has_pixels() {
        writeln!(stdout, "no pixel data")?;
    }

    Ok(())
}

fn print_chunks(path: &Path) -> anyhow::Result<()> {
    let file = File::open(path).with_context(|| format!("unable to open {}", path.display()))?;
    let mut reader = BufReader::new(file);

    let rules = ParseRules::new()
        .accept(ChunkId::ILBM)
        .accept(ChunkId::PBM)
        .handler(ChunkId::ILBM, list_ilbm)
        .handler(ChunkId::PBM, list_pbm)
        .with_fallback(list_chunk);

    let mut list = ChunkList::default();
    let form = parse_iff(&mut reader, &rules, &mut list)
        .with_context(|| format!("failed to parse {}", path.display()))?;

    let mut stdout = std::io::stdout().lock();
    writeln!(stdout, "FORM {}, {} bytes", form.form_type, form.size)?;
    for (id, size) in &list.chunks {
        writeln!(stdout, "  {id} {size}")?;
    }

    Ok(())
}

fn load_ranges(path: &Path) -> anyhow::Result<Vec<ColorRange>> {
    let file = File::open(path).with_context(|| format!("unable to open {}", path.display()))?;
    let ranges = serde_json::from_reader(BufReader::new(file))
        .with_context(|| format!("invalid color ranges in {}", path.display()))?;
    Ok(ranges)
}

fn print_frames(path: &Path, ticks: u32, blend: bool, speed: u32, frames: u32, ranges: Option<&Path>, json: bool) -> anyhow::Result<()> {
    let image = load(path)?;
    let ranges = match ranges {
        Some(ranges) => load_ranges(ranges)?,
        None => image.color_ranges().to_vec(),
    };

    let step = ticks_per_frame(speed);
    let mut stdout = std::io::stdout().lock();

    for frame in 0..frames {
        let now = ticks.wrapping_add(frame.wrapping_mul(step));
        let palette = animate(image.palette(), &ranges, now, blend);

        if json {
            serde_json::to_writer(&mut stdout, &palette)?;
            writeln!(stdout)?;
        } else {
            writeln!(stdout, "frame {frame} (ticks {now:#010X}): {palette}")?;
        }
    }

    Ok(())
}

fn run(args: Args) -> anyhow::Result<()> {
    match args.command {
        Command::Info { path, json } => print_info(&path, json),
        Command::Chunks { path } => print_chunks(&path),
        Command::Frame { path, ticks, blend, speed, frames, ranges, json } => {
            print_frames(&path, ticks, blend, speed, frames, ranges.as_deref(), json)
        }
    }
}

fn main() -> ExitCode {
    let args = Args::parse();

    let level = match args.verbose {
        0 => "warn",
        1 => "debug",
        _ => "trace",
    };
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or(level)).init();

    if let Err(err) = run(args) {
        eprintln!("Error: {err:#}");
        return ExitCode::FAILURE;
    }

    ExitCode::SUCCESS
}
