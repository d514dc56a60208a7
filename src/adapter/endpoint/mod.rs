//! Remote Endpoint Implementations
//!
//! `EndpointFactory` の実装（SFTP とローカルディレクトリ）

pub mod local;
pub mod retry;
pub mod sftp;

use std::sync::Arc;

use crate::adapter::config::EndpointConfig;
use crate::domain::repositories::remote_endpoint::EndpointFactory;

use local::LocalEndpointFactory;
use sftp::{SftpEndpointFactory, SftpSettings};

/// 設定からエンドポイントのファクトリを作る
pub fn build_factory(config: &EndpointConfig) -> Arc<dyn EndpointFactory> {
    match config {
        EndpointConfig::Sftp {
            host,
            port,
            user,
            password,
        } => Arc::new(SftpEndpointFactory::new(SftpSettings {
            host: host.clone(),
            port: *port,
            user: user.clone(),
            password: password.clone(),
        })),
        EndpointConfig::Local { root } => Arc::new(LocalEndpointFactory::new(root)),
    }
}
