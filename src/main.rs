// Thin delegating binary.
//
// The actual server assembly lives in the `placement-server` crate.
#[actix_rt::main]
async fn main() -> std::io::Result<()> {
    placement_server::run().await
}
