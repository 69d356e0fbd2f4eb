//! Connections to commerce platforms other than Shopify.

mod ikas;

pub use ikas::{
    connect_ikas, normalize_shop_name, IkasClient, IkasConnectRequest, IkasConnected, IkasError,
};
