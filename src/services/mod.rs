//! Business logic services

pub mod availability;
pub mod catalog;
pub mod loans;
pub mod locks;
pub mod users;

use crate::{config::AppConfig, repository::Repository};

/// Container for all services
#[derive(Clone)]
pub struct Services {
    pub users: users::UsersService,
    pub catalog: catalog::CatalogService,
    pub availability: availability::AvailabilityCalculator,
    pub loans: loans::LoansService,
    pub repository: Repository,
}

impl Services {
    /// Create all services with the given repository
    pub fn new(repository: Repository, config: &AppConfig) -> Self {
        Self {
            users: users::UsersService::new(repository.clone(), config.auth.clone()),
            catalog: catalog::CatalogService::new(repository.clone(), config.lending.max_page_size),
            availability: availability::AvailabilityCalculator::new(repository.clone()),
            loans: loans::LoansService::new(repository.clone(), config.lending.clone()),
            repository,
        }
    }
}
