//! Marketplace domain types and their wire shapes
//!
//! Read models (`User`, `Product`) mirror the server's camelCase JSON.
//! Write models (`SignupRequest`, `NewProduct`, ...) turn into multipart
//! field lists, filling the default upload names the server expects.

use std::path::Path;

use common::Secret;
use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};
use crate::request::FormField;

/// Content type used when an upload doesn't say otherwise
pub const DEFAULT_IMAGE_MIME: &str = "image/jpeg";

/// A hosted image.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ImageRef {
    pub url: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct User {
    #[serde(alias = "_id")]
    pub id: String,
    pub email: String,
    pub first_name: String,
    pub last_name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub profile_image: Option<ImageRef>,
    #[serde(default)]
    pub is_email_verified: bool,
}

impl User {
    pub fn display_name(&self) -> String {
        format!("{} {}", self.first_name, self.last_name)
    }
}

/// Named point on the map where a product is offered.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Location {
    pub name: String,
    pub latitude: f64,
    pub longitude: f64,
}

/// Seller summary embedded in a product.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ProductOwner {
    #[serde(rename = "_id", alias = "id")]
    pub id: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub first_name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub last_name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub email: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Product {
    #[serde(rename = "_id", alias = "id")]
    pub id: String,
    pub title: String,
    #[serde(default)]
    pub description: String,
    pub price: f64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub location: Option<Location>,
    #[serde(default)]
    pub images: Vec<ImageRef>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub user: Option<ProductOwner>,
}

impl Product {
    /// Whether `user` listed this product.
    pub fn is_owned_by(&self, user: &User) -> bool {
        self.user.as_ref().is_some_and(|owner| owner.id == user.id)
    }
}

/// One page of a paginated listing.
#[derive(Debug, Clone, PartialEq)]
pub struct Page<T> {
    pub items: Vec<T>,
    pub has_next_page: bool,
}

/// A local file to attach to a multipart form.
///
/// Name and type are optional; the endpoint fills defaults when absent.
#[derive(Debug, Clone, Default)]
pub struct Upload {
    pub file_name: Option<String>,
    pub mime_type: Option<String>,
    pub bytes: Vec<u8>,
}

impl Upload {
    pub fn new(bytes: Vec<u8>) -> Self {
        Self {
            bytes,
            ..Self::default()
        }
    }

    /// Read a file, taking its name and inferring the image type from the extension.
    pub async fn from_path(path: &Path) -> Result<Self> {
        let bytes = tokio::fs::read(path)
            .await
            .map_err(|e| Error::InvalidRequest(format!("reading {}: {e}", path.display())))?;
        let file_name = path
            .file_name()
            .map(|name| name.to_string_lossy().into_owned());
        let mime_type = path
            .extension()
            .and_then(|ext| mime_for_extension(&ext.to_string_lossy()))
            .map(str::to_owned);
        Ok(Self {
            file_name,
            mime_type,
            bytes,
        })
    }

    pub(crate) fn field(&self, name: &str, default_file_name: String) -> FormField {
        FormField::File {
            name: name.to_owned(),
            file_name: self.file_name.clone().unwrap_or(default_file_name),
            mime_type: self
                .mime_type
                .clone()
                .unwrap_or_else(|| DEFAULT_IMAGE_MIME.to_owned()),
            bytes: self.bytes.clone(),
        }
    }
}

fn mime_for_extension(ext: &str) -> Option<&'static str> {
    match ext.to_ascii_lowercase().as_str() {
        "jpg" | "jpeg" => Some("image/jpeg"),
        "png" => Some("image/png"),
        "gif" => Some("image/gif"),
        "webp" => Some("image/webp"),
        "heic" => Some("image/heic"),
        _ => None,
    }
}

/// New account registration.
#[derive(Debug, Clone)]
pub struct SignupRequest {
    pub email: String,
    pub password: Secret<String>,
    pub first_name: String,
    pub last_name: String,
    pub profile_image: Option<Upload>,
}

impl SignupRequest {
    pub(crate) fn form_fields(&self) -> Vec<FormField> {
        let mut fields = vec![
            FormField::text("email", &self.email),
            FormField::text("password", self.password.expose()),
            FormField::text("firstName", &self.first_name),
            FormField::text("lastName", &self.last_name),
        ];
        if let Some(image) = &self.profile_image {
            fields.push(image.field("profileImage", "profile.jpg".into()));
        }
        fields
    }
}

/// Profile edit. Names are always sent; the image only when changed.
#[derive(Debug, Clone)]
pub struct ProfileUpdate {
    pub first_name: String,
    pub last_name: String,
    pub profile_image: Option<Upload>,
}

impl ProfileUpdate {
    /// `uploaded_at_ms` names an unnamed image `profile_<ms>.jpg`.
    pub(crate) fn form_fields(&self, uploaded_at_ms: u128) -> Vec<FormField> {
        let mut fields = vec![
            FormField::text("firstName", &self.first_name),
            FormField::text("lastName", &self.last_name),
        ];
        if let Some(image) = &self.profile_image {
            fields.push(image.field("profileImage", format!("profile_{uploaded_at_ms}.jpg")));
        }
        fields
    }
}

/// A product listing to create. All fields are required by the server.
#[derive(Debug, Clone)]
pub struct NewProduct {
    pub title: String,
    pub description: String,
    pub price: f64,
    pub location: Location,
    pub images: Vec<Upload>,
}

impl NewProduct {
    pub(crate) fn form_fields(&self) -> Result<Vec<FormField>> {
        let mut fields = vec![
            FormField::text("title", &self.title),
            FormField::text("description", &self.description),
            FormField::text("price", self.price.to_string()),
            FormField::text("location", location_json(&self.location)?),
        ];
        fields.extend(image_fields(&self.images));
        Ok(fields)
    }
}

/// Partial product edit. Only the fields set are sent; `new_images` are
/// appended to the listing, existing hosted images are left alone.
#[derive(Debug, Clone, Default)]
pub struct ProductUpdate {
    pub title: Option<String>,
    pub description: Option<String>,
    pub price: Option<f64>,
    pub location: Option<Location>,
    pub new_images: Vec<Upload>,
}

impl ProductUpdate {
    pub fn is_empty(&self) -> bool {
        self.title.is_none()
            && self.description.is_none()
            && self.price.is_none()
            && self.location.is_none()
            && self.new_images.is_empty()
    }

    pub(crate) fn form_fields(&self) -> Result<Vec<FormField>> {
        let mut fields = Vec::new();
        if let Some(title) = &self.title {
            fields.push(FormField::text("title", title));
        }
        if let Some(description) = &self.description {
            fields.push(FormField::text("description", description));
        }
        if let Some(price) = self.price {
            fields.push(FormField::text("price", price.to_string()));
        }
        if let Some(location) = &self.location {
            fields.push(FormField::text("location", location_json(location)?));
        }
        fields.extend(image_fields(&self.new_images));
        Ok(fields)
    }
}

fn location_json(location: &Location) -> Result<String> {
    serde_json::to_string(location)
        .map_err(|e| Error::InvalidRequest(format!("encoding location: {e}")))
}

fn image_fields(images: &[Upload]) -> impl Iterator<Item = FormField> + '_ {
    images
        .iter()
        .enumerate()
        .map(|(index, image)| image.field("images", format!("product_{index}.jpg")))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn field_summary(fields: &[FormField]) -> Vec<String> {
        fields
            .iter()
            .map(|field| match field {
                FormField::Text { name, value } => format!("{name}={value}"),
                FormField::File {
                    name,
                    file_name,
                    mime_type,
                    ..
                } => format!("{name}:{file_name}:{mime_type}"),
            })
            .collect()
    }

    #[test]
    fn user_accepts_id_or_underscore_id() {
        let json = r#"{"_id":"u1","email":"a@b.com","firstName":"Ada","lastName":"L","isEmailVerified":true}"#;
        let user: User = serde_json::from_str(json).unwrap();
        assert_eq!(user.id, "u1");
        assert!(user.is_email_verified);
        assert_eq!(user.display_name(), "Ada L");

        let json = r#"{"id":"u2","email":"c@d.com","firstName":"Bo","lastName":"K","profileImage":{"url":"https://img/1"}}"#;
        let user: User = serde_json::from_str(json).unwrap();
        assert_eq!(user.id, "u2");
        assert_eq!(user.profile_image.unwrap().url, "https://img/1");
    }

    #[test]
    fn product_parses_server_shape() {
        let json = r#"{
            "_id": "p1",
            "title": "Bike",
            "description": "Red bike",
            "price": 120.5,
            "location": {"name": "Lisbon", "latitude": 38.72, "longitude": -9.14},
            "images": [{"url": "https://img/p1.jpg"}],
            "user": {"_id": "u1", "firstName": "Ada"}
        }"#;
        let product: Product = serde_json::from_str(json).unwrap();
        assert_eq!(product.id, "p1");
        assert_eq!(product.price, 120.5);
        assert_eq!(product.location.as_ref().unwrap().name, "Lisbon");
        assert_eq!(product.images.len(), 1);

        let owner = User {
            id: "u1".into(),
            email: "a@b.com".into(),
            first_name: "Ada".into(),
            last_name: "L".into(),
            profile_image: None,
            is_email_verified: true,
        };
        assert!(product.is_owned_by(&owner));
    }

    #[test]
    fn signup_fields_use_default_image_name() {
        let request = SignupRequest {
            email: "a@b.com".into(),
            password: Secret::new("secret1".into()),
            first_name: "Ada".into(),
            last_name: "L".into(),
            profile_image: Some(Upload::new(vec![1, 2, 3])),
        };
        assert_eq!(
            field_summary(&request.form_fields()),
            vec![
                "email=a@b.com",
                "password=secret1",
                "firstName=Ada",
                "lastName=L",
                "profileImage:profile.jpg:image/jpeg",
            ]
        );
    }

    #[test]
    fn profile_update_names_image_by_timestamp() {
        let update = ProfileUpdate {
            first_name: "Ada".into(),
            last_name: "L".into(),
            profile_image: Some(Upload::new(vec![1])),
        };
        let fields = field_summary(&update.form_fields(1700000000000));
        assert_eq!(fields[2], "profileImage:profile_1700000000000.jpg:image/jpeg");
    }

    #[test]
    fn new_product_encodes_location_as_json() {
        let product = NewProduct {
            title: "Bike".into(),
            description: "Red".into(),
            price: 99.0,
            location: Location {
                name: "Lisbon".into(),
                latitude: 38.5,
                longitude: -9.25,
            },
            images: vec![
                Upload::new(vec![1]),
                Upload {
                    file_name: Some("back.png".into()),
                    mime_type: Some("image/png".into()),
                    bytes: vec![2],
                },
            ],
        };
        let fields = field_summary(&product.form_fields().unwrap());
        assert_eq!(fields[2], "price=99");
        assert_eq!(
            fields[3],
            r#"location={"name":"Lisbon","latitude":38.5,"longitude":-9.25}"#
        );
        assert_eq!(fields[4], "images:product_0.jpg:image/jpeg");
        assert_eq!(fields[5], "images:back.png:image/png");
    }

    #[test]
    fn product_update_sends_only_set_fields() {
        let update = ProductUpdate {
            price: Some(42.5),
            ..ProductUpdate::default()
        };
        assert!(!update.is_empty());
        assert_eq!(field_summary(&update.form_fields().unwrap()), vec!["price=42.5"]);
        assert!(ProductUpdate::default().is_empty());
    }

    #[tokio::test]
    async fn upload_from_path_infers_name_and_type() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("front.PNG");
        tokio::fs::write(&path, [0x89, 0x50]).await.unwrap();

        let upload = Upload::from_path(&path).await.unwrap();
        assert_eq!(upload.file_name.as_deref(), Some("front.PNG"));
        assert_eq!(upload.mime_type.as_deref(), Some("image/png"));
        assert_eq!(upload.bytes, vec![0x89, 0x50]);
    }

    #[tokio::test]
    async fn upload_from_missing_path_is_invalid_request() {
        let result = Upload::from_path(Path::new("/nonexistent/photo.jpg")).await;
        assert!(matches!(result, Err(Error::InvalidRequest(_))));
    }
}
