#[macro_use]
extern crate rocket;

mod api;
mod app_state;
mod config;
mod engine;
mod error;
mod model;
mod model_registry;
mod scaler;
mod types;

#[cfg(test)]
mod fixtures;

#[launch]
fn rocket() -> _ {
    // 模型和 scaler 在 ignite 时加载，加载失败则不对外服务
    api::mount(rocket::build().attach(app_state::stage()))
}
