// src/db/photo_repo.rs

use std::path::PathBuf;

use image::ImageFormat;
use uuid::Uuid;

use crate::common::error::AppError;

/// Prefixo público das fotos (servidas pelo ServeDir).
pub const UPLOADS_ROUTE: &str = "/uploads";

// Fotos das validações, gravadas em disco com o id da validação como nome.
#[derive(Clone)]
pub struct PhotoRepository {
    dir: PathBuf,
}

impl PhotoRepository {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    pub fn dir(&self) -> &std::path::Path {
        &self.dir
    }

    /// Valida a imagem, grava no disco e devolve a URL pública.
    pub async fn save(&self, validation_id: Uuid, bytes: Vec<u8>) -> Result<String, AppError> {
        // Decodificar uma foto de celular é pesado: fora do runtime assíncrono.
        let (bytes, extension) = tokio::task::spawn_blocking(move || {
            detect_extension(&bytes).map(|ext| (bytes, ext))
        })
        .await
        .map_err(|e| anyhow::anyhow!("Falha na task de validação da imagem: {}", e))??;

        tokio::fs::create_dir_all(&self.dir).await?;

        let file_name = format!("{}.{}", validation_id, extension);
        tokio::fs::write(self.dir.join(&file_name), bytes).await?;

        Ok(format!("{}/{}", UPLOADS_ROUTE, file_name))
    }

    /// Remove a foto referenciada pela URL. Foto já ausente não é erro.
    pub async fn delete(&self, image_url: &str) -> Result<(), AppError> {
        let Some(file_name) = image_url
            .strip_prefix(UPLOADS_ROUTE)
            .and_then(|rest| rest.strip_prefix('/'))
            .filter(|name| !name.is_empty() && !name.contains(['/', '\\']) && *name != "..")
        else {
            tracing::warn!("URL de foto fora do diretório de uploads: {}", image_url);
            return Ok(());
        };

        match tokio::fs::remove_file(self.dir.join(file_name)).await {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
            Err(e) => Err(e.into()),
        }
    }
}

// Aceita apenas PNG, JPEG e WebP que realmente decodificam
fn detect_extension(bytes: &[u8]) -> Result<&'static str, AppError> {
    let format = image::guess_format(bytes)
        .map_err(|_| AppError::InvalidImage("formato não reconhecido".into()))?;

    let extension = match format {
        ImageFormat::Png => "png",
        ImageFormat::Jpeg => "jpg",
        ImageFormat::WebP => "webp",
        other => {
            return Err(AppError::InvalidImage(format!("formato {:?} não suportado", other)));
        }
    };

    image::load_from_memory_with_format(bytes, format)
        .map_err(|e| AppError::InvalidImage(e.to_string()))?;

    Ok(extension)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn tiny_png() -> Vec<u8> {
        let img = image::RgbImage::from_pixel(2, 2, image::Rgb([200, 10, 10]));
        let mut bytes = Vec::new();
        image::DynamicImage::ImageRgb8(img)
            .write_to(&mut bytes, ImageFormat::Png)
            .unwrap();
        bytes
    }

    #[tokio::test]
    async fn saves_valid_png_under_validation_id() {
        let dir = tempfile::tempdir().unwrap();
        let repo = PhotoRepository::new(dir.path());
        let id = Uuid::new_v4();

        let url = repo.save(id, tiny_png()).await.unwrap();

        assert_eq!(url, format!("/uploads/{}.png", id));
        assert!(dir.path().join(format!("{}.png", id)).exists());

        repo.delete(&url).await.unwrap();
        assert!(!dir.path().join(format!("{}.png", id)).exists());
    }

    #[tokio::test]
    async fn rejects_bytes_that_are_not_an_image() {
        let dir = tempfile::tempdir().unwrap();
        let repo = PhotoRepository::new(dir.path());

        let err = repo.save(Uuid::new_v4(), b"definitely not a photo".to_vec()).await.unwrap_err();

        assert!(matches!(err, AppError::InvalidImage(_)));
    }

    #[tokio::test]
    async fn delete_ignores_paths_outside_uploads() {
        let dir = tempfile::tempdir().unwrap();
        let repo = PhotoRepository::new(dir.path());

        repo.delete("/etc/passwd").await.unwrap();
        repo.delete("/uploads/../secret").await.unwrap();
        repo.delete("/uploads/ausente.png").await.unwrap();
    }
}
