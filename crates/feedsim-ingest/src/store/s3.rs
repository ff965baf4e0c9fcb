//! S3 object store over the AWS SDK

use super::{ListPage, ObjectHandle, ObjectStore};
use crate::config::ConnConfig;
use crate::error::{IngestError, Result};
use async_trait::async_trait;
use aws_config::BehaviorVersion;
use aws_sdk_s3::{
    config::{Credentials, Region},
    error::{DisplayErrorContext, ProvideErrorMetadata, SdkError},
    Client,
};
use tracing::{debug, info, instrument};

/// Service error codes that mean the session itself is unusable
const SESSION_ERROR_CODES: &[&str] = &[
    "InvalidAccessKeyId",
    "SignatureDoesNotMatch",
    "ExpiredToken",
    "InvalidToken",
    "AuthorizationHeaderMalformed",
    "PermanentRedirect",
];

/// S3-backed object store
#[derive(Clone)]
pub struct S3Store {
    client: Client,
}

impl S3Store {
    /// Build a client for the configured region
    ///
    /// Static credentials are used when both keys are configured, otherwise
    /// the default AWS provider chain resolves them on first use.
    pub async fn new(conn: &ConnConfig) -> Self {
        debug!(region = %conn.region, endpoint = ?conn.endpoint, "Initializing S3 client");

        let shared = aws_config::defaults(BehaviorVersion::latest())
            .region(Region::new(conn.region.clone()))
            .load()
            .await;

        let mut builder = aws_sdk_s3::config::Builder::from(&shared).force_path_style(conn.path_style);

        if let (Some(access_key), Some(secret_key)) = (&conn.access_key, &conn.secret_key) {
            builder = builder.credentials_provider(Credentials::new(
                access_key,
                secret_key,
                None,
                None,
                "feedsim-config",
            ));
        }

        if let Some(endpoint) = &conn.endpoint {
            builder = builder.endpoint_url(endpoint);
        }

        info!("S3 client initialized for region: {}", conn.region);

        Self {
            client: Client::from_conf(builder.build()),
        }
    }
}

/// Session problems: the request never reached S3 or was refused for the
/// credentials or region rather than for the resource
fn session_error<E, R>(err: &SdkError<E, R>) -> bool
where
    E: ProvideErrorMetadata,
{
    match err {
        SdkError::ConstructionFailure(_) | SdkError::DispatchFailure(_) | SdkError::TimeoutError(_) => {
            true
        },
        SdkError::ServiceError(_) => err
            .as_service_error()
            .and_then(|e| e.code())
            .is_some_and(|code| SESSION_ERROR_CODES.contains(&code)),
        _ => false,
    }
}

#[async_trait]
impl ObjectStore for S3Store {
    #[instrument(skip(self))]
    async fn list_page(
        &self,
        bucket: &str,
        prefix: &str,
        delimiter: Option<&str>,
        continuation: Option<&str>,
    ) -> Result<ListPage> {
        let output = self
            .client
            .list_objects_v2()
            .bucket(bucket)
            .prefix(prefix)
            .set_delimiter(delimiter.map(str::to_string))
            .set_continuation_token(continuation.map(str::to_string))
            .send()
            .await
            .map_err(|e| {
                let message = DisplayErrorContext(&e).to_string();
                if session_error(&e) {
                    IngestError::Session(message)
                } else {
                    IngestError::Listing {
                        bucket: bucket.to_string(),
                        prefix: prefix.to_string(),
                        message,
                    }
                }
            })?;

        let objects = output
            .contents()
            .iter()
            .filter_map(|object| {
                let key = object.key()?;
                let size = object.size().unwrap_or(0).max(0) as u64;
                Some(ObjectHandle::new(key, size))
            })
            .collect::<Vec<_>>();

        let common_prefixes = output
            .common_prefixes()
            .iter()
            .filter_map(|p| p.prefix().map(str::to_string))
            .collect::<Vec<_>>();

        let next_continuation = if output.is_truncated().unwrap_or(false) {
            output.next_continuation_token().map(str::to_string)
        } else {
            None
        };

        debug!(
            objects = objects.len(),
            prefixes = common_prefixes.len(),
            more = next_continuation.is_some(),
            "Listed page of s3://{}/{}",
            bucket,
            prefix
        );

        Ok(ListPage {
            objects,
            common_prefixes,
            next_continuation,
        })
    }

    #[instrument(skip(self))]
    async fn download(&self, bucket: &str, key: &str, size_hint: u64) -> Result<Vec<u8>> {
        let download_error = |message: String| IngestError::Download {
            bucket: bucket.to_string(),
            key: key.to_string(),
            message,
        };

        let response = self
            .client
            .get_object()
            .bucket(bucket)
            .key(key)
            .send()
            .await
            .map_err(|e| download_error(DisplayErrorContext(&e).to_string()))?;

        let data = response
            .body
            .collect()
            .await
            .map_err(|e| download_error(DisplayErrorContext(&e).to_string()))?
            .to_vec();

        if data.len() as u64 != size_hint {
            debug!(
                listed = size_hint,
                actual = data.len(),
                "Object size changed since listing: s3://{}/{}",
                bucket,
                key
            );
        }

        Ok(data)
    }
}
