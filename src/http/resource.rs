//! # Resolución de Recursos
//! src/http/resource.rs
//!
//! Traduce el target de un request a un archivo dentro del document root.
//!
//! Hay dos barreras contra path traversal:
//!
//! 1. Léxica: recorrer los componentes del target y rechazar cualquier `..`
//!    que suba por encima del root.
//! 2. Física: canonicalizar el resultado (resuelve symlinks) y exigir que
//!    siga dentro del root canonicalizado.

use super::request::HttpCode;
use std::fs::{self, File};
use std::io;
use std::os::unix::fs::PermissionsExt;
use std::path::{Path, PathBuf};

/// Archivo servido cuando el target es un directorio
pub const INDEX_FILE: &str = "index.html";

/// Bit de lectura para "otros"
const WORLD_READABLE: u32 = 0o004;

/// Archivo abierto y listo para enviarse
#[derive(Debug)]
pub struct Resource {
    pub path: PathBuf,
    pub file: File,
    pub len: u64,
}

/// Document root canonicalizado
#[derive(Debug, Clone)]
pub struct DocumentRoot {
    root: PathBuf,
}

impl DocumentRoot {
    /// Canonicaliza `path`, que debe ser un directorio existente
    pub fn new(path: &Path) -> io::Result<Self> {
        let root = path.canonicalize()?;
        if !root.is_dir() {
            return Err(io::Error::new(
                io::ErrorKind::InvalidInput,
                format!("{} is not a directory", root.display()),
            ));
        }
        Ok(Self { root })
    }

    pub fn path(&self) -> &Path {
        &self.root
    }

    /// Resuelve un target ya decodificado (ej: `/img/logo.png`)
    ///
    /// Errores posibles: `NoResource`, `Forbidden`, `InternalError`.
    pub fn resolve(&self, target: &str) -> Result<Resource, HttpCode> {
        let relative = confine(target).ok_or(HttpCode::Forbidden)?;
        let mut path = self.root.join(relative);

        let mut meta = fs::metadata(&path).map_err(|e| match e.kind() {
            io::ErrorKind::PermissionDenied => HttpCode::Forbidden,
            _ => HttpCode::NoResource,
        })?;

        if meta.is_dir() {
            path.push(INDEX_FILE);
            // Directorio sin índice: no se listan directorios
            meta = fs::metadata(&path).map_err(|_| HttpCode::Forbidden)?;
        }

        let canonical = path.canonicalize().map_err(|_| HttpCode::NoResource)?;
        if !canonical.starts_with(&self.root) {
            return Err(HttpCode::Forbidden);
        }

        if !meta.is_file() || meta.permissions().mode() & WORLD_READABLE == 0 {
            return Err(HttpCode::Forbidden);
        }

        let file = File::open(&canonical).map_err(|_| HttpCode::InternalError)?;
        Ok(Resource {
            path: canonical,
            len: meta.len(),
            file,
        })
    }
}

/// Normaliza el target léxicamente sin salir del root
///
/// Retorna `None` si algún `..` escaparía del root.
fn confine(target: &str) -> Option<PathBuf> {
    let mut parts: Vec<&str> = Vec::new();
    for segment in target.split('/') {
        match segment {
            "" | "." => {}
            ".." => {
                parts.pop()?;
            }
            s => parts.push(s),
        }
    }
    Some(parts.iter().collect())
}
