macro_rules! cfg_dwarf {
    ($($item:item)*) => {
        $(
            #[cfg(feature = "dwarf")]
            #[cfg_attr(docsrs, doc(cfg(feature = "dwarf")))]
            $item
        )*
    }
}

macro_rules! cfg_core_symbolication {
    ($($item:item)*) => {
        $(
            #[cfg(feature = "core-symbolication")]
            #[cfg_attr(docsrs, doc(cfg(feature = "core-symbolication")))]
            $item
        )*
    }
}
