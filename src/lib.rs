/****************************************************************
 * $ID: lib.rs  	Tue 21 Nov 2023 15:25:27+0800               *
 *                                                              *
 * Maintainer: 范美辉 (MeiHui FAN) <mhfan@ustc.edu>              *
 * Copyright (c) 2023 M.H.Fan, All rights reserved.             *
 ****************************************************************/

pub mod error;
pub mod data;
pub mod model;
pub mod training;
pub mod evaluate;
pub mod plot;
pub mod mgr;

pub use error::{Error, Result};
pub use mgr::ModelMgr;
