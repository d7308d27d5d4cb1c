#[macro_use]
extern crate rocket;

pub mod config;
pub mod db;
pub mod error;
pub mod import;
pub mod models;
pub mod request_logger;
pub mod routes;
pub mod store;

use crate::config::{CustomerListConfig, ImportConfig};
use crate::db::CustomerDb;
use crate::request_logger::RequestLogger;
use crate::store::{CustomerStore, PgCustomerStore};
use env_logger::Env;
use rocket::data::{ByteUnit, Limits};
use rocket::fairing::AdHoc;
use rocket::figment::Figment;
use rocket::http::Method;
use rocket::{Build, Rocket};
use rocket_cors::{AllowedOrigins, CorsOptions};
use rocket_db_pools::Database;
use rocket_okapi::{
    openapi_get_routes,
    rapidoc::{GeneralConfig, HideShowConfig, RapiDocConfig, make_rapidoc},
    settings::UrlObject,
    swagger_ui::{SwaggerUIConfig, make_swagger_ui},
};
use std::sync::{Arc, Once};

static LOGGER: Once = Once::new();

/// Extra room on top of the file ceiling for multipart framing and other fields.
const FORM_OVERHEAD_BYTES: u64 = 64 * 1024;

pub fn init_logger() {
    LOGGER.call_once(|| {
        env_logger::Builder::from_env(
            Env::default().default_filter_or("info,rocket::server=warn,rocket::request=warn"),
        )
        .init();
    });
}

/// Request body limits large enough for the configured upload ceiling to be
/// enforced by the import route rather than cut off by Rocket.
pub fn upload_limits(config: &ImportConfig) -> Limits {
    let file = ByteUnit::from(config.max_upload_bytes.saturating_add(1));
    let form = ByteUnit::from(
        config
            .max_upload_bytes
            .saturating_add(FORM_OVERHEAD_BYTES),
    );

    Limits::default().limit("file", file).limit("data-form", form)
}

fn figment(import_config: &ImportConfig) -> Figment {
    rocket::Config::figment().merge(("limits", upload_limits(import_config)))
}

pub fn rocket() -> Rocket<Build> {
    init_logger();

    let import_config = ImportConfig::from_env();
    let list_config = CustomerListConfig::from_env();
    log::info!(
        "import settings: batch size {}, upload limit {}, extensions {:?}",
        import_config.batch_size,
        import_config.max_upload_label(),
        import_config.allowed_extensions
    );

    let rocket = rocket::custom(figment(&import_config))
        .attach(RequestLogger)
        .attach(CustomerDb::init());

    let cors = CorsOptions::default()
        .allowed_origins(AllowedOrigins::all())
        .allowed_methods(
            vec![Method::Get, Method::Post]
                .into_iter()
                .map(From::from)
                .collect(),
        )
        .to_cors();

    let rocket = match cors {
        Ok(cors) => rocket.attach(cors),
        Err(err) => {
            log::error!("invalid CORS configuration, continuing without it: {}", err);
            rocket
        }
    };

    rocket
        .attach(AdHoc::try_on_ignite(
            "Run Migrations",
            |rocket| async move {
                match CustomerDb::fetch(&rocket) {
                    Some(db) => match db::run_migrations(db).await {
                        Ok(()) => Ok(rocket),
                        Err(e) => {
                            log::error!("database migrations failed: {}", e);
                            Err(rocket)
                        }
                    },
                    None => {
                        log::error!("database pool not available for migrations");
                        Err(rocket)
                    }
                }
            },
        ))
        .attach(AdHoc::try_on_ignite(
            "Manage DB Pool and Customer Store",
            |rocket| async move {
                match CustomerDb::fetch(&rocket) {
                    Some(db) => {
                        let pool = (**db).clone();
                        let store: Arc<dyn CustomerStore> =
                            Arc::new(PgCustomerStore::new(pool.clone()));
                        Ok(rocket.manage(pool).manage(store))
                    }
                    None => Err(rocket),
                }
            },
        ))
        .manage(import_config)
        .manage(list_config)
        .mount(
            "/api",
            openapi_get_routes![
                routes::health::health_check,
                routes::customers::list_customers,
            ],
        )
        .mount("/api", routes![routes::import::import_customers])
        .mount(
            "/api/docs/swagger/",
            make_swagger_ui(&SwaggerUIConfig {
                url: "../../openapi.json".to_owned(),
                ..Default::default()
            }),
        )
        .mount(
            "/api/docs/rapidoc/",
            make_rapidoc(&RapiDocConfig {
                general: GeneralConfig {
                    spec_urls: vec![UrlObject::new("Customer Import API", "../../openapi.json")],
                    ..Default::default()
                },
                hide_show: HideShowConfig {
                    allow_spec_url_load: false,
                    allow_spec_file_load: false,
                    ..Default::default()
                },
                ..Default::default()
            }),
        )
}

#[cfg_attr(not(test), allow(dead_code))]
pub mod test_support {
    use crate::config::{CustomerListConfig, ImportConfig};
    use crate::store::{CustomerStore, PgCustomerStore};
    use chrono::NaiveDate;
    use rocket::config::LogLevel;
    use rocket::figment::Figment;
    use rocket::local::asynchronous::Client as AsyncClient;
    use rocket::local::blocking::Client;
    use rocket::{Build, Rocket, Route};
    use rocket_db_pools::sqlx::types::BigDecimal;
    use rocket_db_pools::sqlx::{self, PgPool};
    use std::str::FromStr;
    use std::sync::Arc;

    pub use database::{TestDatabase, TestDatabaseError};

    /// Helpers for seeding the `customers` table in tests.
    pub struct TestFixtures<'a> {
        pool: &'a PgPool,
    }

    impl<'a> TestFixtures<'a> {
        pub fn new(pool: &'a PgPool) -> Self {
            Self { pool }
        }

        /// Insert a customer row directly, returning its id.
        pub async fn insert_customer(
            &self,
            name: &str,
            email: &str,
            date_of_birth: Option<NaiveDate>,
            annual_income: Option<&str>,
        ) -> Result<i64, sqlx::Error> {
            let income = annual_income
                .map(|raw| {
                    BigDecimal::from_str(raw).map_err(|err| sqlx::Error::Decode(Box::new(err)))
                })
                .transpose()?;

            sqlx::query_scalar(
                "INSERT INTO customers (name, email, date_of_birth, annual_income) VALUES ($1, $2, $3, $4) RETURNING id",
            )
            .bind(name)
            .bind(email)
            .bind(date_of_birth)
            .bind(income)
            .fetch_one(self.pool)
            .await
        }

        pub async fn customer_count(&self) -> Result<i64, sqlx::Error> {
            sqlx::query_scalar("SELECT COUNT(*) FROM customers")
                .fetch_one(self.pool)
                .await
        }
    }

    pub mod database {
        use log::LevelFilter;
        use rocket_db_pools::sqlx::postgres::{PgConnectOptions, PgPoolOptions};
        use rocket_db_pools::sqlx::{self, ConnectOptions, PgPool};
        use testcontainers_modules::postgres::Postgres;
        use testcontainers_modules::testcontainers::{
            ContainerAsync, core::error::TestcontainersError, runners::AsyncRunner,
        };
        use thiserror::Error;

        #[derive(Debug, Error)]
        pub enum TestDatabaseError {
            #[error("database error: {0}")]
            Sqlx(#[from] sqlx::Error),
            #[error("migration error: {0}")]
            Migration(#[from] sqlx::migrate::MigrateError),
            #[error("container error: {0}")]
            Container(#[from] TestcontainersError),
        }

        /// Disposable Postgres container with the schema applied.
        ///
        /// Tests treat a [`TestDatabaseError::Container`] as "no container
        /// runtime here" and skip.
        pub struct TestDatabase {
            pool: PgPool,
            _container: ContainerAsync<Postgres>,
        }

        impl TestDatabase {
            pub async fn new() -> Result<Self, TestDatabaseError> {
                let container = Postgres::default().start().await?;

                let host = container.get_host().await?.to_string();
                let port = container.get_host_port_ipv4(5432).await?;
                let url = format!("postgres://postgres:postgres@{}:{}/postgres", host, port);

                let options: PgConnectOptions = url.parse()?;
                let pool = PgPoolOptions::new()
                    .max_connections(5)
                    .connect_with(options.log_statements(LevelFilter::Off))
                    .await?;

                crate::db::run_migrations(&pool).await?;

                Ok(Self {
                    pool,
                    _container: container,
                })
            }

            pub fn pool_clone(&self) -> PgPool {
                self.pool.clone()
            }

            /// Close the pool before the container goes away.
            pub async fn close(self) {
                self.pool.close().await;
            }
        }
    }

    /// Builder for constructing Rocket instances tailored for integration tests.
    pub struct TestRocketBuilder {
        figment: Figment,
        mounts: Vec<(String, Vec<Route>)>,
        pg_pool: Option<PgPool>,
        store: Option<Arc<dyn CustomerStore>>,
        import_config: ImportConfig,
        list_config: CustomerListConfig,
    }

    impl Default for TestRocketBuilder {
        fn default() -> Self {
            Self::new()
        }
    }

    impl TestRocketBuilder {
        /// Random port, logging disabled, default import settings.
        pub fn new() -> Self {
            let import_config = ImportConfig::default();
            let figment = super::figment(&import_config)
                .merge(("port", 0))
                .merge(("log_level", LogLevel::Off))
                .merge(("cli_colors", false));

            Self {
                figment,
                mounts: Vec::new(),
                pg_pool: None,
                store: None,
                import_config,
                list_config: CustomerListConfig::default(),
            }
        }

        /// Mount routes under `/api`.
        pub fn mount_api_routes(mut self, routes: Vec<Route>) -> Self {
            self.mounts.push(("/api".to_string(), routes));
            self
        }

        /// Manage a `PgPool`. Unless a store is set explicitly, a
        /// [`PgCustomerStore`] over the same pool is managed too.
        pub fn manage_pg_pool(mut self, pool: PgPool) -> Self {
            self.pg_pool = Some(pool);
            self
        }

        pub fn manage_customer_store(mut self, store: Arc<dyn CustomerStore>) -> Self {
            self.store = Some(store);
            self
        }

        /// Replace the import settings, upload limits included.
        pub fn manage_import_config(mut self, config: ImportConfig) -> Self {
            self.figment = self
                .figment
                .merge(("limits", super::upload_limits(&config)));
            self.import_config = config;
            self
        }

        pub fn build(self) -> Rocket<Build> {
            let mut rocket = rocket::custom(self.figment)
                .manage(self.import_config)
                .manage(self.list_config);

            for (base, routes) in self.mounts {
                rocket = rocket.mount(base, routes);
            }

            let store = match (&self.store, &self.pg_pool) {
                (Some(store), _) => Some(Arc::clone(store)),
                (None, Some(pool)) => {
                    Some(Arc::new(PgCustomerStore::new(pool.clone())) as Arc<dyn CustomerStore>)
                }
                (None, None) => None,
            };

            if let Some(store) = store {
                rocket = rocket.manage(store);
            }

            if let Some(pool) = self.pg_pool {
                rocket = rocket.manage(pool);
            }

            rocket
        }

        pub fn blocking_client(self) -> Client {
            Client::tracked(self.build()).expect("valid Rocket instance")
        }

        pub async fn async_client(self) -> AsyncClient {
            AsyncClient::tracked(self.build())
                .await
                .expect("valid Rocket instance")
        }
    }
}
