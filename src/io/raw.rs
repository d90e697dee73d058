/// Read / write float arrays as raw binary

use std::fs::{self, File};
use std::io::{Write, Read, BufWriter, BufReader};
use std::path::Path;

use ndarray::{Array3, ArrayView3};

use crate::{Angle, Intensity, ReconError, Result};

pub fn write(data: impl Iterator<Item = Intensity>, path: &Path) -> std::io::Result<()> {
    let file = File::create(path)?;
    let mut buf = BufWriter::new(file);
    for datum in data {
        buf.write_all(&datum.to_le_bytes())?;
    }
    buf.flush()
}

type IORes<T> = std::io::Result<T>;
pub fn read<'a>(path: &Path) -> IORes<impl Iterator<Item = IORes<Intensity>> + 'a> {
    let file = File::open(path)?;
    let mut buf = BufReader::new(file);
    let mut buffer = [0; 8];

    Ok(std::iter::from_fn(move || {
        use std::io::ErrorKind::{Interrupted, UnexpectedEof};
        let mut filled = 0;
        while filled < buffer.len() {
            match buf.read(&mut buffer[filled..]) {
                Ok(0) => break,
                Ok(k) => filled += k,
                Err(e) if e.kind() == Interrupted => continue,
                Err(e) => return Some(Err(e)),
            }
        }
        match filled {
            0 => None,
            8 => Some(Ok(Intensity::from_le_bytes(buffer))),
            k => Some(Err(std::io::Error::new(UnexpectedEof, format!("file ends {k} bytes into an 8-byte value")))),
        }
    }))
}

/// Write the elements of `volume`, in logical order, as little-endian `f64`s
pub fn write_volume(volume: ArrayView3<Intensity>, path: &Path) -> Result<()> {
    Ok(write(volume.iter().copied(), path)?)
}

/// Read a volume (or sinogram) of the given `shape` written by `write_volume`
pub fn read_volume(path: &Path, shape: (usize, usize, usize)) -> Result<Array3<Intensity>> {
    let data: Vec<Intensity> = read(path)?.collect::<IORes<_>>()?;
    let (a, b, c) = shape;
    if data.len() != a * b * c {
        return Err(ReconError::ShapeMismatch { what: "raw file", expected: vec![a * b * c], got: vec![data.len()] })
    }
    Array3::from_shape_vec(shape, data)
        .map_err(|e| ReconError::invalid("shape", e.to_string()))
}

/// Angles in radians, separated by whitespace or commas, from a text file
pub fn read_angles(path: &Path) -> Result<Vec<Angle>> {
    fs::read_to_string(path)?
        .split(|c: char| c.is_whitespace() || c == ',')
        .filter(|s| !s.is_empty())
        .map(|s| s.parse::<Angle>()
             .map_err(|_| ReconError::invalid("angles", format!("`{s}` is not a number"))))
        .collect()
}
