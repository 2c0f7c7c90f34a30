/// Parser for the triangle subset of the Wavefront OBJ text format
///
/// Recognised records: `v x y z [w]`, `vn x y z`, `vt u v [w]` and
/// `f i/t/n i/t/n i/t/n` with 1-based indices. Everything else is skipped.
/// Faces are expanded into flat per-corner arrays once the whole stream has
/// been read; shared corners are duplicated, never deduplicated.
use std::fs::File;
use std::io::{BufRead, BufReader};
use std::path::Path;
use std::str::FromStr;

use nalgebra::{Vector2, Vector3};
use nom::{
    character::complete::{char, i64 as index, space1},
    combinator::{all_consuming, opt},
    number::complete::float,
    sequence::preceded,
    IResult,
};

use crate::context::Primitive;
use crate::error::{Attribute, MeshError};
use crate::geometry::MeshAsset;

/// One `i/t/n` vertex reference as written in the file
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
struct CornerRef {
    position: i64,
    uv: Option<i64>,
    normal: Option<i64>,
}

#[derive(Debug, Default)]
struct ObjBuilder {
    positions: Vec<Vector3<f32>>,
    normals: Vec<Vector3<f32>>,
    uvs: Vec<Vector2<f32>>,
    /// Source line of each face, alongside its three corners
    faces: Vec<(usize, [CornerRef; 3])>,
    layout: Option<(bool, bool)>,
}

impl ObjBuilder {
    fn feed(&mut self, number: usize, line: &str) -> Result<(), MeshError> {
        let line = line.trim();
        let Some(keyword) = line.split_whitespace().next() else {
            return Ok(());
        };
        let rest = &line[keyword.len()..];
        let format_error = |reason: &str| MeshError::Format {
            line: number,
            text: line.to_string(),
            reason: reason.to_string(),
        };

        match keyword {
            "v" => {
                let (_, position) = all_consuming(position_record)(rest)
                    .map_err(|_| format_error("expected `v x y z [w]`"))?;
                self.positions.push(position);
            }
            "vn" => {
                let (_, normal) =
                    all_consuming(vector3)(rest).map_err(|_| format_error("expected `vn x y z`"))?;
                self.normals.push(normal);
            }
            "vt" => {
                let (_, uv) =
                    all_consuming(uv_record)(rest).map_err(|_| format_error("expected `vt u v [w]`"))?;
                self.uvs.push(uv);
            }
            "f" => {
                let tokens: Vec<&str> = rest.split_whitespace().collect();
                if tokens.len() != 3 {
                    return Err(format_error(&format!(
                        "faces must be triangles, found {} vertex references",
                        tokens.len()
                    )));
                }
                let mut corners = [CornerRef {
                    position: 0,
                    uv: None,
                    normal: None,
                }; 3];
                for (slot, token) in corners.iter_mut().zip(tokens.iter().copied()) {
                    let (_, parsed) = all_consuming(corner_ref)(token).map_err(|_| {
                        format_error(&format!("vertex reference `{token}` is not of the form i/t/n"))
                    })?;
                    *slot = parsed;
                }

                for corner in &corners {
                    let layout = (corner.uv.is_some(), corner.normal.is_some());
                    match self.layout {
                        None => self.layout = Some(layout),
                        Some(expected) if expected != layout => {
                            return Err(format_error(
                                "faces disagree about which attributes they reference",
                            ));
                        }
                        Some(_) => {}
                    }
                }
                self.faces.push((number, corners));
            }
            _ => {}
        }
        Ok(())
    }

    fn finish(self) -> Result<MeshAsset, MeshError> {
        let corner_count = self.faces.len() * 3;
        let (with_uvs, with_normals) = self.layout.unwrap_or((false, false));

        let mut positions = Vec::with_capacity(corner_count);
        let mut uvs = Vec::with_capacity(if with_uvs { corner_count } else { 0 });
        let mut normals = Vec::with_capacity(if with_normals { corner_count } else { 0 });

        for (line, corners) in &self.faces {
            for corner in corners {
                positions.push(gather(&self.positions, corner.position, Attribute::Position, *line)?);
                if let Some(i) = corner.uv {
                    uvs.push(gather(&self.uvs, i, Attribute::Uv, *line)?);
                }
                if let Some(i) = corner.normal {
                    normals.push(gather(&self.normals, i, Attribute::Normal, *line)?);
                }
            }
        }

        let mut mesh = MeshAsset::new(Primitive::Triangles, positions)?;
        if with_uvs {
            mesh = mesh.with_uvs(uvs)?;
        }
        if with_normals {
            mesh = mesh.with_normals(normals)?;
        }
        Ok(mesh)
    }
}

/// Looks up a 1-based index, failing on anything outside `1..=items.len()`
fn gather<T: Copy>(items: &[T], index: i64, attribute: Attribute, line: usize) -> Result<T, MeshError> {
    usize::try_from(index)
        .ok()
        .and_then(|i| i.checked_sub(1))
        .and_then(|i| items.get(i).copied())
        .ok_or(MeshError::Range {
            line,
            attribute,
            index,
            available: items.len(),
        })
}

fn vector3(input: &str) -> IResult<&str, Vector3<f32>> {
    let (input, x) = preceded(space1, float)(input)?;
    let (input, y) = preceded(space1, float)(input)?;
    let (input, z) = preceded(space1, float)(input)?;
    Ok((input, Vector3::new(x, y, z)))
}

fn position_record(input: &str) -> IResult<&str, Vector3<f32>> {
    let (input, position) = vector3(input)?;
    let (input, _w) = opt(preceded(space1, float))(input)?;
    Ok((input, position))
}

fn uv_record(input: &str) -> IResult<&str, Vector2<f32>> {
    let (input, u) = preceded(space1, float)(input)?;
    let (input, v) = preceded(space1, float)(input)?;
    let (input, _w) = opt(preceded(space1, float))(input)?;
    Ok((input, Vector2::new(u, v)))
}

fn corner_ref(input: &str) -> IResult<&str, CornerRef> {
    let (input, position) = index(input)?;
    let (input, uv) = preceded(char('/'), opt(index))(input)?;
    let (input, normal) = preceded(char('/'), opt(index))(input)?;
    Ok((input, CornerRef { position, uv, normal }))
}

impl MeshAsset {
    /// Parses a complete geometry stream. Any error aborts the load.
    pub fn parse<R: BufRead>(reader: R) -> Result<Self, MeshError> {
        let mut builder = ObjBuilder::default();
        for (i, line) in reader.lines().enumerate() {
            builder.feed(i + 1, &line?)?;
        }
        builder.finish()
    }

    pub fn from_path<P: AsRef<Path>>(path: P) -> Result<Self, MeshError> {
        let path = path.as_ref();
        let mesh = Self::parse(BufReader::new(File::open(path)?))?;
        log::info!(
            "loaded {} triangles from {}",
            mesh.triangle_count(),
            path.display()
        );
        Ok(mesh)
    }
}

impl FromStr for MeshAsset {
    type Err = MeshError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::parse(s.as_bytes())
    }
}
