mod fuse;
