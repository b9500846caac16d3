use thiserror::Error;

#[derive(Error, Debug)]
pub enum AxmlError {
    /// Provided file too small to be a compiled XML document
    #[error("file size too small for binary XML")]
    TooSmallError,

    /// File magic is not the XML chunk constant
    #[error("not a valid binary XML file")]
    NotBinaryXml,

    /// Invalid header
    #[error("got error while parsing header")]
    HeaderError,

    /// Got error while parsing string pool
    #[error("got error while parsing string pool")]
    StringPoolError,

    /// Got error while parsing resource map
    #[error("got error while parsing resource map")]
    ResourceMapError,

    /// A chunk's declared size runs past the end of the file
    #[error("chunk overruns file boundary")]
    ChunkOverrun,

    /// Got error while parsing xml tree
    #[error("got error while parsing xml tree")]
    XmlTreeError,
}

#[derive(Error, Debug)]
pub enum ArscError {
    /// Provided file too small to be a resource table
    #[error("file size too small for resources file")]
    TooSmallError,

    /// File magic is not the table chunk constant
    #[error("not a valid resources file")]
    NotResourceTable,

    /// Invalid header
    #[error("got error while parsing header")]
    HeaderError,

    /// Got error while parsing string pool
    #[error("got error while parsing string pool")]
    StringPoolError,

    /// Got error while parsing resource table package
    #[error("got error while parsing resource table package")]
    PackageError,

    /// A chunk's declared size runs past the end of the file
    #[error("chunk overruns file boundary")]
    ChunkOverrun,
}
