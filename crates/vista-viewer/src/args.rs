use std::path::{Path, PathBuf};

use clap::Parser;

/// Image and glTF viewer.
#[derive(Parser, Debug)]
#[command(name = "vista-viewer", version)]
pub struct Args {
    /// glTF scene to show as a rotating mesh (repeatable)
    #[arg(long = "mesh", value_name = "FILE")]
    pub meshes: Vec<PathBuf>,

    /// Log filter in env_logger syntax; overrides RUST_LOG
    #[arg(long, value_name = "FILTER")]
    pub log: Option<String>,

    /// Images to show as textured quads
    #[arg(value_name = "IMAGE")]
    pub images: Vec<PathBuf>,
}

/// What a dropped or listed file is loaded as.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LoadRequest {
    Image(PathBuf),
    Mesh(PathBuf),
}

impl LoadRequest {
    /// Classifies by extension: `.gltf` / `.glb` are meshes, anything else
    /// goes to the image decoder.
    pub fn from_path(path: &Path) -> Self {
        let is_mesh = path
            .extension()
            .and_then(|e| e.to_str())
            .is_some_and(|e| e.eq_ignore_ascii_case("gltf") || e.eq_ignore_ascii_case("glb"));
        if is_mesh {
            Self::Mesh(path.to_path_buf())
        } else {
            Self::Image(path.to_path_buf())
        }
    }
}

impl Args {
    /// Command-line files in load order: meshes first, then images.
    pub fn load_requests(&self) -> Vec<LoadRequest> {
        self.meshes
            .iter()
            .cloned()
            .map(LoadRequest::Mesh)
            .chain(self.images.iter().cloned().map(LoadRequest::Image))
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn meshes_and_images_are_separated() {
        let args = Args::parse_from(["vista-viewer", "--mesh", "a.gltf", "b.png", "--mesh", "c.glb", "d.jpg"]);
        assert_eq!(args.meshes, vec![PathBuf::from("a.gltf"), PathBuf::from("c.glb")]);
        assert_eq!(args.images, vec![PathBuf::from("b.png"), PathBuf::from("d.jpg")]);
        assert_eq!(
            args.load_requests(),
            vec![
                LoadRequest::Mesh("a.gltf".into()),
                LoadRequest::Mesh("c.glb".into()),
                LoadRequest::Image("b.png".into()),
                LoadRequest::Image("d.jpg".into()),
            ]
        );
    }

    #[test]
    fn no_arguments_is_an_empty_viewer() {
        let args = Args::parse_from(["vista-viewer"]);
        assert!(args.load_requests().is_empty());
        assert!(args.log.is_none());
    }

    #[test]
    fn dropped_files_are_classified_by_extension() {
        assert_eq!(LoadRequest::from_path(Path::new("x/Avocado.GLTF")), LoadRequest::Mesh("x/Avocado.GLTF".into()));
        assert_eq!(LoadRequest::from_path(Path::new("scene.glb")), LoadRequest::Mesh("scene.glb".into()));
        assert_eq!(LoadRequest::from_path(Path::new("photo.png")), LoadRequest::Image("photo.png".into()));
        assert_eq!(LoadRequest::from_path(Path::new("noext")), LoadRequest::Image("noext".into()));
    }
}
