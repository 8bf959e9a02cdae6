//! S3-backed tile store.

use async_trait::async_trait;
use aws_sdk_s3::primitives::ByteStream;
use aws_sdk_s3::types::StorageClass;
use aws_sdk_s3::Client;
use bytes::Bytes;

use crate::error::StoreError;
use crate::format::Format;
use crate::tile::Coordinate;

use super::{tile_key, TileStore};

/// Default key prefix for stored tiles.
pub const DEFAULT_S3_PATH: &str = "osm";

/// Tiles as objects in an S3 or S3-compatible bucket.
///
/// Objects are written with the format's content type and, unless disabled,
/// the reduced redundancy storage class.
#[derive(Clone)]
pub struct S3Store {
    client: Client,
    bucket: String,
    path: String,
    reduced_redundancy: bool,
}

impl S3Store {
    pub fn new(client: Client, bucket: impl Into<String>) -> Self {
        Self {
            client,
            bucket: bucket.into(),
            path: DEFAULT_S3_PATH.to_string(),
            reduced_redundancy: true,
        }
    }

    /// Set the key prefix.
    pub fn with_path(mut self, path: impl Into<String>) -> Self {
        self.path = path.into();
        self
    }

    pub fn with_reduced_redundancy(mut self, enabled: bool) -> Self {
        self.reduced_redundancy = enabled;
        self
    }

    pub fn bucket(&self) -> &str {
        &self.bucket
    }

    /// Object key of a tile.
    pub fn key(&self, coord: Coordinate, format: Format) -> String {
        let path = self.path.trim_matches('/');
        if path.is_empty() {
            tile_key(coord, format)
        } else {
            format!("{}/{}", path, tile_key(coord, format))
        }
    }
}

#[async_trait]
impl TileStore for S3Store {
    async fn read_tile(
        &self,
        coord: Coordinate,
        format: Format,
    ) -> Result<Option<Bytes>, StoreError> {
        let key = self.key(coord, format);
        let resp = match self
            .client
            .get_object()
            .bucket(&self.bucket)
            .key(&key)
            .send()
            .await
        {
            Ok(resp) => resp,
            Err(e) => {
                let is_missing = e
                    .as_service_error()
                    .map(|se| se.is_no_such_key())
                    .unwrap_or(false)
                    || e
                        .raw_response()
                        .map(|r| r.status().as_u16() == 404)
                        .unwrap_or(false);
                if is_missing {
                    return Ok(None);
                }
                return Err(StoreError::S3(format!("s3://{}/{}: {}", self.bucket, key, e)));
            }
        };

        let data = resp
            .body
            .collect()
            .await
            .map_err(|e| StoreError::Connection(e.to_string()))?
            .into_bytes();
        Ok(Some(data))
    }

    async fn write_tile(
        &self,
        data: Bytes,
        coord: Coordinate,
        format: Format,
    ) -> Result<(), StoreError> {
        let key = self.key(coord, format);
        let mut request = self
            .client
            .put_object()
            .bucket(&self.bucket)
            .key(&key)
            .content_type(format.mimetype())
            .body(ByteStream::from(data));
        if self.reduced_redundancy {
            request = request.storage_class(StorageClass::ReducedRedundancy);
        }
        request
            .send()
            .await
            .map_err(|e| StoreError::S3(format!("s3://{}/{}: {}", self.bucket, key, e)))?;
        Ok(())
    }
}

/// Create an S3 client with optional custom endpoint and region.
///
/// A custom endpoint (MinIO and similar) switches to path-style addressing.
pub async fn create_s3_client(endpoint_url: Option<&str>, region: &str) -> Client {
    let region = aws_config::Region::new(region.to_string());
    let mut config_loader =
        aws_config::defaults(aws_config::BehaviorVersion::latest()).region(region);

    if let Some(endpoint) = endpoint_url {
        config_loader = config_loader.endpoint_url(endpoint);
    }

    let sdk_config = config_loader.load().await;
    let s3_config = aws_sdk_s3::config::Builder::from(&sdk_config)
        .force_path_style(endpoint_url.is_some())
        .build();

    Client::from_conf(s3_config)
}
