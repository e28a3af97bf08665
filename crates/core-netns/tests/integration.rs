//! Integration tests for the namespace/fabric driver that don't belong in
//! a single module's `#[cfg(test)]` block.

fn init_logging() {
    let _ = tracing_subscriber::fmt().with_env_filter("core_netns=debug").try_init();
}

#[tokio::test]
async fn fabric_error_variants_display_and_box() {
    init_logging();

    use core_netns::FabricError;

    let errors: Vec<FabricError> = vec![FabricError::InvalidConfig("bad config".to_string())];

    for error in errors {
        let _display = error.to_string();
        let _debug = format!("{:?}", error);
        let _: Box<dyn std::error::Error> = Box::new(error);
    }
}

#[tokio::test]
#[cfg_attr(not(feature = "sudo-tests"), ignore)]
async fn fabric_instantiates_and_destroys_a_node() {
    init_logging();

    use core_model::wire::NodeType;
    use core_netns::Fabric;

    let mut fabric = Fabric::new().await.expect("fabric requires CAP_NET_ADMIN");
    fabric
        .instantiate_node(9001, NodeType::Default)
        .await
        .expect("namespace creation requires CAP_NET_ADMIN");
    fabric.destroy_node(9001).await.expect("namespace teardown should succeed");
}

#[tokio::test]
#[cfg_attr(not(feature = "sudo-tests"), ignore)]
async fn fabric_wires_a_link_between_two_nodes() {
    init_logging();

    use core_model::wire::NodeType;
    use core_model::{Interface, LinkOptions};
    use core_netns::Fabric;
    use ipnetwork::Ipv4Network;
    use std::net::Ipv4Addr;

    let mut fabric = Fabric::new().await.expect("fabric requires CAP_NET_ADMIN");
    fabric.instantiate_node(9101, NodeType::Default).await.unwrap();
    fabric.instantiate_node(9102, NodeType::Default).await.unwrap();

    let mut iface1 = Interface::new(0, 9101, "eth0").unwrap();
    iface1.add_ipv4(Ipv4Network::new(Ipv4Addr::new(10, 200, 0, 1), 30).unwrap());
    let mut iface2 = Interface::new(0, 9102, "eth0").unwrap();
    iface2.add_ipv4(Ipv4Network::new(Ipv4Addr::new(10, 200, 0, 2), 30).unwrap());

    let options = LinkOptions {
        delay_us: Some(20_000),
        loss_pct: Some(1.0),
        ..Default::default()
    };

    fabric
        .instantiate_wired_link(9101, &iface1, 9102, &iface2, &options, &options)
        .await
        .expect("wiring a link requires CAP_NET_ADMIN");

    fabric.destroy_node(9101).await.ok();
    fabric.destroy_node(9102).await.ok();
}
