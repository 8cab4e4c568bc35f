//! AWS S3 and S3-compatible (MinIO) object stores.
//!
//! Uploads go through the `object_store` S3 client. Bucket provisioning is not
//! part of the `object_store` API, so it is done with the AWS SDK.

use std::{sync::Arc, time::Duration};

use aws_config::{BehaviorVersion, Region};
use aws_sdk_s3::{
    Client as S3Client,
    config::Credentials,
    types::{BucketLocationConstraint, CreateBucketConfiguration},
};
use object_store::{ClientOptions, ObjectStore, RetryConfig, aws::AmazonS3Builder, prefix::PrefixStore};
use snafu::ResultExt;
use tracing::{debug, info};

use crate::{
    BucketStatus, ObjectStoreFactory,
    error::{CreateBucketSnafu, CreationSnafu, HeadBucketSnafu, InvalidBucketNameSnafu, Result},
};

const DEFAULT_REGION: &str = "us-east-1";
const CREDENTIALS_PROVIDER_NAME: &str = "riffle";

/// Connection settings for an S3 or S3-compatible bucket.
#[derive(Debug, Clone)]
pub struct S3StoreOptions {
    pub bucket: String,
    /// Custom endpoint, e.g. `http://localhost:9000` for MinIO.
    pub endpoint: Option<String>,
    pub region: String,
    pub access_key_id: Option<String>,
    pub secret_access_key: Option<String>,
    /// Key prefix prepended to every object written.
    pub prefix: Option<String>,
    /// Upper bound for a single HTTP request, uploads included.
    pub request_timeout: Duration,
    /// Transport retries performed by the client for a single request.
    pub max_retries: usize,
}

/// Factory for S3 and S3-compatible object stores.
pub struct S3StoreFactory {
    options: S3StoreOptions,
}

impl S3StoreFactory {
    pub fn new(options: S3StoreOptions) -> Result<Self> {
        validate_bucket_name(&options.bucket)?;
        Ok(Self { options })
    }

    pub fn options(&self) -> &S3StoreOptions {
        &self.options
    }

    async fn sdk_client(&self) -> S3Client {
        let mut loader = aws_config::defaults(BehaviorVersion::latest())
            .region(Region::new(self.options.region.clone()));

        if let (Some(access_key_id), Some(secret_access_key)) =
            (&self.options.access_key_id, &self.options.secret_access_key)
        {
            let credentials = Credentials::new(
                access_key_id,
                secret_access_key,
                None,
                None,
                CREDENTIALS_PROVIDER_NAME,
            );
            loader = loader.credentials_provider(credentials);
        }

        let sdk_config = loader.load().await;
        let mut builder = aws_sdk_s3::config::Builder::from(&sdk_config);

        if let Some(endpoint) = &self.options.endpoint {
            builder = builder.endpoint_url(endpoint).force_path_style(true);
        }

        S3Client::from_conf(builder.build())
    }

    fn create_bucket_configuration(&self) -> Option<CreateBucketConfiguration> {
        // us-east-1 rejects an explicit location constraint.
        if self.options.region == DEFAULT_REGION {
            return None;
        }

        let constraint = BucketLocationConstraint::from(self.options.region.as_str());
        Some(
            CreateBucketConfiguration::builder()
                .location_constraint(constraint)
                .build(),
        )
    }
}

#[async_trait::async_trait]
impl ObjectStoreFactory for S3StoreFactory {
    fn bucket(&self) -> &str {
        &self.options.bucket
    }

    async fn ensure_bucket(&self) -> Result<BucketStatus> {
        let bucket = &self.options.bucket;
        let client = self.sdk_client().await;

        match client.head_bucket().bucket(bucket).send().await {
            Ok(_) => {
                debug!(%bucket, "Bucket already exists");
                return Ok(BucketStatus::AlreadyExists);
            }
            Err(err) => {
                let not_found = err
                    .as_service_error()
                    .is_some_and(|service_err| service_err.is_not_found());

                if !not_found {
                    return Err(aws_sdk_s3::Error::from(err)).context(HeadBucketSnafu {
                        bucket: bucket.clone(),
                    });
                }
            }
        }

        let result = client
            .create_bucket()
            .bucket(bucket)
            .set_create_bucket_configuration(self.create_bucket_configuration())
            .send()
            .await;

        match result {
            Ok(_) => {
                info!(%bucket, "Created bucket");
                Ok(BucketStatus::Created)
            }
            Err(err)
                if err
                    .as_service_error()
                    .is_some_and(|service_err| service_err.is_bucket_already_owned_by_you()) =>
            {
                debug!(%bucket, "Bucket was created concurrently");
                Ok(BucketStatus::AlreadyExists)
            }
            Err(err) => Err(aws_sdk_s3::Error::from(err)).context(CreateBucketSnafu {
                bucket: bucket.clone(),
            }),
        }
    }

    async fn create_object_store(&self) -> Result<Arc<dyn ObjectStore>> {
        let options = &self.options;

        let client_options = ClientOptions::new().with_timeout(options.request_timeout);
        let retry = RetryConfig {
            max_retries: options.max_retries,
            ..Default::default()
        };

        let mut builder = AmazonS3Builder::from_env()
            .with_bucket_name(&options.bucket)
            .with_region(&options.region)
            .with_client_options(client_options)
            .with_retry(retry);

        if let Some(access_key_id) = &options.access_key_id {
            builder = builder.with_access_key_id(access_key_id);
        }

        if let Some(secret_access_key) = &options.secret_access_key {
            builder = builder.with_secret_access_key(secret_access_key);
        }

        if let Some(endpoint) = &options.endpoint {
            // MinIO and friends are commonly served over plain HTTP.
            builder = builder
                .with_endpoint(endpoint)
                .with_allow_http(endpoint.starts_with("http://"));
        }

        let store = builder.build().context(CreationSnafu {
            store_type: "S3",
        })?;

        let Some(prefix) = &options.prefix else {
            return Ok(Arc::new(store));
        };

        Ok(Arc::new(PrefixStore::new(store, prefix.as_str())))
    }
}

impl Default for S3StoreOptions {
    fn default() -> Self {
        Self {
            bucket: String::new(),
            endpoint: None,
            region: DEFAULT_REGION.to_string(),
            access_key_id: None,
            secret_access_key: None,
            prefix: None,
            request_timeout: Duration::from_secs(30),
            max_retries: 3,
        }
    }
}

pub(crate) fn validate_bucket_name(bucket: &str) -> Result<()> {
    if bucket.is_empty() {
        return InvalidBucketNameSnafu {
            bucket,
            message: "bucket name is empty",
        }
        .fail();
    }

    if bucket.contains('/') {
        return InvalidBucketNameSnafu {
            bucket,
            message: "bucket name must not contain '/'",
        }
        .fail();
    }

    Ok(())
}
