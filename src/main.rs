#[macro_use]
extern crate rocket;

#[launch]
fn rocket() -> _ {
    log::info!("starting customer import API");
    customer_import_api::rocket()
}
